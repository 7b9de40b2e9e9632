use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::fetch::{FetchError, Fetcher};
use crate::parser::listing::{parse_listing, ListingPage};
use crate::parser::MarkupError;

#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("listing page fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("listing page {url} is malformed: {source}")]
    Markup {
        url: String,
        #[source]
        source: MarkupError,
    },
    #[error("bad listing URL {url:?}: {source}")]
    BadUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Walks result-list pages and harvests detail links.
#[derive(Clone)]
pub struct PageCrawler {
    fetcher: Arc<dyn Fetcher>,
    delay: Duration,
}

impl PageCrawler {
    pub fn new(fetcher: Arc<dyn Fetcher>, delay: Duration) -> Self {
        PageCrawler { fetcher, delay }
    }

    /// A fresh cursor at `start_url`. `max_pages` caps how many listing
    /// pages it will visit; `None` follows "next" links to the end.
    pub fn cursor(&self, start_url: &str, max_pages: Option<usize>) -> Result<ListingCursor, CrawlError> {
        let start = Url::parse(start_url).map_err(|source| CrawlError::BadUrl {
            url: start_url.to_string(),
            source,
        })?;
        Ok(ListingCursor {
            fetcher: Arc::clone(&self.fetcher),
            delay: self.delay,
            next: Some(start),
            visited: HashSet::new(),
            pages: 0,
            max_pages,
        })
    }

    /// Every detail link reachable from `start_url`, in page order then
    /// document order. Any listing failure aborts the whole crawl.
    pub async fn collect_detail_links(&self, start_url: &str, max_pages: Option<usize>) -> Result<Vec<String>, CrawlError> {
        let mut cursor = self.cursor(start_url, max_pages)?;
        let mut links = Vec::new();
        while let Some(page) = cursor.next_page().await? {
            links.extend(page.links);
            info!("Collected {} links", links.len());
        }
        debug!("Crawl from {} done after {} pages", start_url, cursor.pages_visited());
        Ok(links)
    }
}

/// Crawl state: where to go next and where we have been.
pub struct ListingCursor {
    fetcher: Arc<dyn Fetcher>,
    delay: Duration,
    next: Option<Url>,
    visited: HashSet<String>,
    pages: usize,
    max_pages: Option<usize>,
}

impl ListingCursor {
    pub fn pages_visited(&self) -> usize {
        self.pages
    }

    /// Fetch and parse the next listing page, or `None` once done.
    pub async fn next_page(&mut self) -> Result<Option<ListingPage>, CrawlError> {
        if self.max_pages.is_some_and(|max| self.pages >= max) {
            self.next = None;
        }
        let Some(url) = self.next.take() else {
            return Ok(None);
        };

        if !self.visited.insert(url.to_string()) {
            warn!("Listing page {} links back to an earlier page, stopping", url);
            return Ok(None);
        }

        if self.pages > 0 && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        debug!("Fetching listing page {}", url);
        let html = self.fetcher.get(url.as_str()).await?;
        let page = parse_listing(&url, &html).map_err(|source| CrawlError::Markup {
            url: url.to_string(),
            source,
        })?;
        self.pages += 1;

        info!("Listing page {} ({}): {} detail links", self.pages, url, page.links.len());

        self.next = page
            .next
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|source| CrawlError::BadUrl {
                url: page.next.clone().unwrap_or_default(),
                source,
            })?;
        Ok(Some(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::StaticFetcher;

    const BASE: &str = "https://www.wta.org/go-outside/hikes";

    fn listing_url(offset: usize) -> String {
        format!("{}?b_start:int={}", BASE, offset)
    }

    fn listing_html(page: usize, per_page: usize, has_next: bool) -> String {
        let mut html = String::from("<html><body>");
        for i in 0..per_page {
            html.push_str(&format!(
                r#"<a class="listitem-title" href="/go-hiking/hikes/trail-{}-{}">Trail</a>"#,
                page, i
            ));
        }
        if has_next {
            html.push_str(&format!(
                r#"<span class="next"><a href="{}">next</a></span>"#,
                listing_url((page + 1) * per_page)
            ));
        }
        html.push_str("</body></html>");
        html
    }

    fn site(pages: usize, per_page: usize) -> StaticFetcher {
        (0..pages).fold(StaticFetcher::new(), |f, p| {
            f.page(&listing_url(p * per_page), listing_html(p, per_page, p + 1 < pages))
        })
    }

    fn crawler(fetcher: StaticFetcher) -> (PageCrawler, Arc<StaticFetcher>) {
        let fetcher = Arc::new(fetcher);
        (PageCrawler::new(fetcher.clone(), Duration::ZERO), fetcher)
    }

    #[tokio::test]
    async fn k_pages_of_n_links_in_order() {
        for (k, n) in [(1, 1), (1, 5), (3, 4), (5, 2)] {
            let (crawler, _) = crawler(site(k, n));
            let links = crawler.collect_detail_links(&listing_url(0), None).await.unwrap();
            assert_eq!(links.len(), k * n);
            let expected: Vec<String> = (0..k)
                .flat_map(|p| (0..n).map(move |i| format!("https://www.wta.org/go-hiking/hikes/trail-{}-{}", p, i)))
                .collect();
            assert_eq!(links, expected);
        }
    }

    #[tokio::test]
    async fn each_page_is_fetched_once() {
        let (crawler, fetcher) = crawler(site(3, 2));
        crawler.collect_detail_links(&listing_url(0), None).await.unwrap();
        assert_eq!(fetcher.hits(), vec![listing_url(0), listing_url(2), listing_url(4)]);
    }

    #[tokio::test]
    async fn page_limit_stops_early() {
        let (crawler, fetcher) = crawler(site(4, 3));
        let links = crawler.collect_detail_links(&listing_url(3), Some(1)).await.unwrap();
        assert_eq!(links.len(), 3);
        assert!(links[0].ends_with("trail-1-0"));
        assert_eq!(fetcher.hits().len(), 1);
    }

    #[tokio::test]
    async fn missing_listing_page_is_an_error() {
        // Page 1 points at page 2, which does not exist.
        let fetcher = StaticFetcher::new()
            .page(&listing_url(0), listing_html(0, 2, true))
            .page(&listing_url(2), listing_html(1, 2, true));
        let (crawler, _) = crawler(fetcher);
        let err = crawler.collect_detail_links(&listing_url(0), None).await.unwrap_err();
        assert!(matches!(err, CrawlError::Fetch(FetchError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn self_referencing_next_terminates() {
        let html = format!(
            r#"<a class="listitem-title" href="/go-hiking/hikes/loop">Loop</a>
               <span class="next"><a href="{}">next</a></span>"#,
            listing_url(0)
        );
        let (crawler, _) = crawler(StaticFetcher::new().page(&listing_url(0), html));
        let links = crawler.collect_detail_links(&listing_url(0), None).await.unwrap();
        assert_eq!(links, vec!["https://www.wta.org/go-hiking/hikes/loop"]);
    }

    #[tokio::test]
    async fn cursor_is_restartable() {
        let (crawler, _) = crawler(site(2, 2));
        let mut first = crawler.cursor(&listing_url(0), None).unwrap();
        assert_eq!(first.next_page().await.unwrap().unwrap().links.len(), 2);

        let again = crawler.collect_detail_links(&listing_url(0), None).await.unwrap();
        assert_eq!(again.len(), 4);

        assert!(first.next_page().await.unwrap().is_some());
        assert!(first.next_page().await.unwrap().is_none());
        assert_eq!(first.pages_visited(), 2);
    }
}
