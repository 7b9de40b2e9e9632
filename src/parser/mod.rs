pub mod chain;
pub mod detail;
pub mod listing;

use scraper::ElementRef;

use crate::coords::DecodeError;

/// Why one markup lookup came back empty-handed.
#[derive(Debug, thiserror::Error)]
pub enum MarkupError {
    #[error("no element matches `{0}`")]
    Absent(&'static str),
    #[error("`{0}` matched but holds no text")]
    Empty(&'static str),
    #[error("expected {expected} `{selector}` blocks, found {found}")]
    Count {
        selector: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("`{selector}` has no `{attr}` attribute")]
    MissingAttr {
        selector: &'static str,
        attr: &'static str,
    },
    #[error("bad link {href:?}: {source}")]
    BadLink {
        href: String,
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// All text under `el`, trimmed.
pub fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
