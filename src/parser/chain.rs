//! Ordered fallback lookups. The site's markup has moved fields around over
//! the years, so each field is a list of strategies tried front to back.

use scraper::Html;

use super::MarkupError;

/// One way of finding a value in a parsed page.
pub type Strategy<T> = fn(&Html) -> Result<T, MarkupError>;

/// First strategy that succeeds wins. On total failure every reason is
/// returned, in chain order.
pub fn first_present<T>(doc: &Html, chain: &[Strategy<T>]) -> Result<T, Vec<MarkupError>> {
    let mut misses = Vec::with_capacity(chain.len());
    for strategy in chain {
        match strategy(doc) {
            Ok(v) => return Ok(v),
            Err(e) => misses.push(e),
        }
    }
    Err(misses)
}

/// Joins miss reasons for a log line.
pub fn describe(misses: &[MarkupError]) -> String {
    misses
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join("; then ")
}
