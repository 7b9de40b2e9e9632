use std::path::PathBuf;

use anyhow::{Context, Result};
use config::Config;
use serde::Deserialize;

const MAX_RETRIES_CAP: u32 = 10;

/// How the run decides which listing pages exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Pagination {
    /// A fixed number of listing pages, one crawl per page offset.
    Fixed,
    /// One crawl from the start page, following "next" links to the end.
    FollowNext,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub page_size: usize,
    pub total_pages: usize,
    pub start_page: usize,
    pub pagination: Pagination,
    pub output: PathBuf,
    pub concurrency: usize,
    pub request_delay_ms: u64,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_url: "https://www.wta.org/go-outside/hikes".into(),
            page_size: 30,
            total_pages: 113,
            start_page: 0,
            pagination: Pagination::Fixed,
            output: PathBuf::from("washington_hikes.csv"),
            concurrency: 4,
            request_delay_ms: 500,
            max_retries: 3,
            base_backoff_ms: 2000,
            timeout_secs: 30,
            user_agent: concat!("wta_scraper/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl Settings {
    /// Defaults, then `wta_scraper.toml` if present, then `WTA_*` env vars.
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .add_source(config::File::with_name("wta_scraper").required(false))
            .add_source(config::Environment::with_prefix("WTA"))
            .build()
            .context("Failed to read settings")?
            .try_deserialize::<Settings>()
            .context("Invalid settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.page_size > 0, "page_size must be positive");
        anyhow::ensure!(self.concurrency > 0, "concurrency must be positive");
        anyhow::ensure!(self.max_retries <= MAX_RETRIES_CAP, "max_retries must be at most {}", MAX_RETRIES_CAP);
        url::Url::parse(&self.base_url).with_context(|| format!("bad base_url {:?}", self.base_url))?;
        Ok(())
    }

    /// Listing URL for the page starting at `offset` trails.
    pub fn listing_url(&self, offset: usize) -> String {
        format!("{}?b_start:int={}", self.base_url, offset)
    }

    pub fn offset(&self, page: usize) -> usize {
        page * self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_site_layout() {
        let s = Settings::default();
        assert_eq!(s.page_size, 30);
        assert_eq!(s.total_pages, 113);
        assert_eq!(s.pagination, Pagination::Fixed);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn listing_urls_step_by_page_size() {
        let s = Settings::default();
        assert_eq!(s.listing_url(s.offset(0)), "https://www.wta.org/go-outside/hikes?b_start:int=0");
        assert_eq!(s.listing_url(s.offset(3)), "https://www.wta.org/go-outside/hikes?b_start:int=90");
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let s = Settings {
            concurrency: 0,
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn retry_count_is_capped() {
        let s = Settings {
            max_retries: 32,
            ..Settings::default()
        };
        assert!(s.validate().is_err());
    }
}
