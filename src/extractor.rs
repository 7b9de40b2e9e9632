use std::sync::Arc;

use crate::fetch::{FetchError, Fetcher};
use crate::parser::detail::parse_detail;
use crate::parser::MarkupError;
use crate::record::TrailRecord;

/// Record-level failures. Anything short of these degrades field by field.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{url} has no trail name: {source}")]
    MissingName {
        url: String,
        #[source]
        source: MarkupError,
    },
}

/// Fetches a trail page and turns it into a record.
#[derive(Clone)]
pub struct FieldExtractor {
    fetcher: Arc<dyn Fetcher>,
}

impl FieldExtractor {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        FieldExtractor { fetcher }
    }

    pub async fn extract(&self, url: &str) -> Result<TrailRecord, ExtractError> {
        let html = self.fetcher.get(url).await?;
        parse_detail(url, &html).map_err(|source| ExtractError::MissingName {
            url: url.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::StaticFetcher;
    use crate::record::Features;

    const URL: &str = "https://www.wta.org/go-hiking/hikes/wallace-falls";

    #[tokio::test]
    async fn extracts_fetched_page() {
        let html = std::fs::read_to_string("tests/fixtures/trail_no_features.html").unwrap();
        let extractor = FieldExtractor::new(Arc::new(StaticFetcher::new().page(URL, html)));
        let r = extractor.extract(URL).await.unwrap();
        assert_eq!(r.name, "Wallace Falls");
        assert_eq!(r.length.as_deref(), Some("5.6 miles, roundtrip"));
        assert_eq!(r.elevation_gain.as_deref(), Some("1300 feet"));
        assert_eq!(r.features, Features::Tags(vec![]));
        assert_eq!(r.url, URL);
    }

    #[tokio::test]
    async fn fetch_failure_is_reported() {
        let extractor = FieldExtractor::new(Arc::new(StaticFetcher::new()));
        let err = extractor.extract(URL).await.unwrap_err();
        assert!(matches!(err, ExtractError::Fetch(_)));
    }

    #[tokio::test]
    async fn nameless_page_is_reported() {
        let extractor = FieldExtractor::new(Arc::new(StaticFetcher::new().page(URL, "<h1>Not a trail</h1>")));
        let err = extractor.extract(URL).await.unwrap_err();
        assert!(matches!(err, ExtractError::MissingName { .. }));
    }
}
