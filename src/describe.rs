use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::fetch::{FetchError, Fetcher};
use crate::parser::text_of;

static BODY_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div#hike-body-text").unwrap());
static PARAGRAPH_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());

/// First paragraph of the trail write-up, if the page has one.
pub fn parse_description(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let body = doc.select(&BODY_SEL).next()?;
    let p = body.select(&PARAGRAPH_SEL).next()?;
    Some(text_of(p)).filter(|t| !t.is_empty())
}

pub async fn fetch_description(fetcher: &dyn Fetcher, url: &str) -> Result<Option<String>, FetchError> {
    let html = fetcher.get(url).await?;
    Ok(parse_description(&html))
}
