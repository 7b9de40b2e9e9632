use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use super::MarkupError;

const DETAIL_LINK: &str = "a.listitem-title";
const NEXT_LINK: &str = "span.next a";

static DETAIL_LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(DETAIL_LINK).unwrap());
static NEXT_LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(NEXT_LINK).unwrap());

/// What one result-list page yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    pub links: Vec<String>,
    pub next: Option<String>,
}

/// Detail links in document order plus the "next page" target, both
/// resolved against `page_url`. A detail anchor without a usable href
/// fails the whole page.
pub fn parse_listing(page_url: &Url, html: &str) -> Result<ListingPage, MarkupError> {
    let doc = Html::parse_document(html);

    let links = doc
        .select(&DETAIL_LINK_SEL)
        .map(|a| {
            let href = a.value().attr("href").ok_or(MarkupError::MissingAttr {
                selector: DETAIL_LINK,
                attr: "href",
            })?;
            resolve(page_url, href)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let next = doc
        .select(&NEXT_LINK_SEL)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| resolve(page_url, href))
        .transpose()?;

    Ok(ListingPage { links, next })
}

fn resolve(base: &Url, href: &str) -> Result<String, MarkupError> {
    base.join(href.trim())
        .map(String::from)
        .map_err(|source| MarkupError::BadLink {
            href: href.to_string(),
            source,
        })
}
