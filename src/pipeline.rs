use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use crate::crawler::PageCrawler;
use crate::dataset::DatasetAccumulator;
use crate::extractor::{ExtractError, FieldExtractor};
use crate::fetch::Fetcher;
use crate::record::TrailRecord;
use crate::settings::{Pagination, Settings};

/// One crawl invocation and the row its first link lands on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub page: usize,
    pub url: String,
    pub first_row: usize,
    pub max_pages: Option<usize>,
}

/// The crawl plan for a run.
pub fn segments(settings: &Settings) -> Vec<Segment> {
    match settings.pagination {
        Pagination::Fixed => (settings.start_page..settings.start_page + settings.total_pages)
            .map(|page| {
                let offset = settings.offset(page);
                Segment {
                    page,
                    url: settings.listing_url(offset),
                    first_row: offset,
                    max_pages: Some(1),
                }
            })
            .collect(),
        Pagination::FollowNext => {
            let offset = settings.offset(settings.start_page);
            vec![Segment {
                page: settings.start_page,
                url: settings.listing_url(offset),
                first_row: offset,
                max_pages: None,
            }]
        }
    }
}

#[derive(Debug)]
pub struct RunStats {
    pub started_at: DateTime<Local>,
    pub segments: usize,
    pub links: usize,
    pub committed: usize,
    pub skipped: usize,
    pub not_reported: BTreeMap<&'static str, usize>,
    pub last_row: Option<usize>,
    pub cancelled: bool,
}

struct Outcome {
    row: usize,
    url: String,
    result: Result<TrailRecord, ExtractError>,
}

/// Crawl, extract, commit.
pub struct Pipeline {
    crawler: PageCrawler,
    extractor: FieldExtractor,
    concurrency: usize,
    delay: Duration,
    cancel: Arc<AtomicBool>,
    progress: bool,
}

impl Pipeline {
    pub fn new(fetcher: Arc<dyn Fetcher>, settings: &Settings) -> Self {
        let delay = Duration::from_millis(settings.request_delay_ms);
        Pipeline {
            crawler: PageCrawler::new(Arc::clone(&fetcher), delay),
            extractor: FieldExtractor::new(fetcher),
            concurrency: settings.concurrency.max(1),
            delay,
            cancel: Arc::new(AtomicBool::new(false)),
            progress: true,
        }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Setting this flag stops the run before the next detail fetch.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub async fn run(&self, segments: &[Segment], acc: &mut DatasetAccumulator) -> Result<RunStats> {
        let mut stats = RunStats {
            started_at: Local::now(),
            segments: 0,
            links: 0,
            committed: 0,
            skipped: 0,
            not_reported: BTreeMap::new(),
            last_row: None,
            cancelled: false,
        };

        for seg in segments {
            if self.is_cancelled() {
                break;
            }
            info!("Scraping hikes on page #{}", seg.page + 1);
            let links = self
                .crawler
                .collect_detail_links(&seg.url, seg.max_pages)
                .await
                .with_context(|| format!("Crawl from {} failed", seg.url))?;
            stats.segments += 1;
            stats.links += links.len();
            self.run_segment(seg.first_row, links, acc, &mut stats).await?;
        }

        stats.committed = acc.committed();
        stats.skipped = acc.skipped().len();
        stats.last_row = acc.last_row();
        stats.cancelled = self.is_cancelled();
        Ok(stats)
    }

    /// Fetch every link on a bounded pool and commit in crawl order.
    async fn run_segment(
        &self,
        first_row: usize,
        links: Vec<String>,
        acc: &mut DatasetAccumulator,
        stats: &mut RunStats,
    ) -> Result<()> {
        if links.is_empty() {
            return Ok(());
        }

        let pb = if self.progress {
            ProgressBar::new(links.len() as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
                .progress_chars("=> "),
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let (tx, mut rx) = mpsc::channel::<Outcome>(self.concurrency * 2);

        for (i, url) in links.into_iter().enumerate() {
            let row = first_row + i;
            let sem = Arc::clone(&semaphore);
            let tx = tx.clone();
            let extractor = self.extractor.clone();
            let cancel = Arc::clone(&self.cancel);
            let delay = self.delay;

            tokio::spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return;
                };
                if cancel.load(Ordering::Relaxed) {
                    return;
                }
                let result = extractor.extract(&url).await;
                let _ = tx.send(Outcome { row, url, result }).await;
                // Hold the lane for the politeness gap.
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            });
        }

        // Drop our copy of tx so rx closes when all workers finish
        drop(tx);

        // Workers finish in any order; rows are settled strictly in order.
        let mut pending: BTreeMap<usize, Outcome> = BTreeMap::new();
        let mut next_row = first_row;
        while let Some(outcome) = rx.recv().await {
            pending.insert(outcome.row, outcome);
            while let Some(ready) = pending.remove(&next_row) {
                settle(ready, acc, stats)?;
                next_row += 1;
                pb.inc(1);
            }
        }
        pb.finish_and_clear();

        if !pending.is_empty() {
            warn!(
                "Stopped at row {}; {} finished rows after it were not committed",
                next_row,
                pending.len()
            );
        }
        Ok(())
    }
}

fn settle(outcome: Outcome, acc: &mut DatasetAccumulator, stats: &mut RunStats) -> Result<()> {
    match outcome.result {
        Ok(record) => {
            for col in record.unreported_columns() {
                *stats.not_reported.entry(col).or_default() += 1;
            }
            acc.commit(outcome.row, record)?;
        }
        Err(e) => {
            warn!("Row {}: skipping {}: {}", outcome.row, outcome.url, e);
            acc.skip(outcome.row, e.to_string())?;
        }
    }
    Ok(())
}
