//! Trail detail page → `TrailRecord`.
//!
//! Only the trail name is mandatory. Every other field has its own
//! fallback chain and falls back to `NR` on its own, except length and
//! elevation gain, which share one block of markup and are read as a pair.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::chain::{describe, first_present, Strategy};
use super::{text_of, MarkupError};
use crate::coords;
use crate::record::{Features, Field, TrailRecord};

const NAME: &str = "h1.documentFirstHeading";
const REGION_STAT: &str = r#"div[class="hike-stat grid_3 alpha"]"#;
const REGION_BANNER: &str = "div#hike-region";
const STATS: &str = r#"div[class="hike-stat grid_3"]"#;
const RATING: &str = "div.current-rating";
const VOTES: &str = "div.rating-count";
const REPORTS: &str = "span.ReportCount";
const PASS: &str = "div#pass-required-info";
const FEATURE_BOX: &str = "#hike-features";
const FEATURE: &str = r#"div[class="feature grid_1 "]"#;
const MAP_LINK: &str = "a.visualNoPrint.full-map";

fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static NAME_SEL: LazyLock<Selector> = LazyLock::new(|| sel(NAME));
static REGION_STAT_SEL: LazyLock<Selector> = LazyLock::new(|| sel(REGION_STAT));
static REGION_BANNER_SEL: LazyLock<Selector> = LazyLock::new(|| sel(REGION_BANNER));
static STATS_SEL: LazyLock<Selector> = LazyLock::new(|| sel(STATS));
static RATING_SEL: LazyLock<Selector> = LazyLock::new(|| sel(RATING));
static VOTES_SEL: LazyLock<Selector> = LazyLock::new(|| sel(VOTES));
static REPORTS_SEL: LazyLock<Selector> = LazyLock::new(|| sel(REPORTS));
static PASS_SEL: LazyLock<Selector> = LazyLock::new(|| sel(PASS));
static FEATURE_BOX_SEL: LazyLock<Selector> = LazyLock::new(|| sel(FEATURE_BOX));
static FEATURE_SEL: LazyLock<Selector> = LazyLock::new(|| sel(FEATURE));
static MAP_LINK_SEL: LazyLock<Selector> = LazyLock::new(|| sel(MAP_LINK));
static DIV: LazyLock<Selector> = LazyLock::new(|| sel("div"));
static SPAN: LazyLock<Selector> = LazyLock::new(|| sel("span"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| sel("a"));

const REGION_CHAIN: [Strategy<String>; 2] = [region_from_stats, region_from_banner];
const LENGTH_GAIN_CHAIN: [Strategy<(String, String)>; 1] = [length_and_gain];
const RATING_CHAIN: [Strategy<String>; 1] = [rating];
const VOTES_CHAIN: [Strategy<String>; 1] = [votes];
const REPORTS_CHAIN: [Strategy<String>; 1] = [reports];
const PASS_CHAIN: [Strategy<String>; 1] = [pass];
const FEATURES_CHAIN: [Strategy<Vec<String>>; 2] = [features_in_box, features_anywhere];
const COORDS_CHAIN: [Strategy<(String, String)>; 1] = [coordinates];

/// Parse one detail page. Fails only when the trail name is missing.
pub fn parse_detail(url: &str, html: &str) -> Result<TrailRecord, MarkupError> {
    let doc = Html::parse_document(html);
    let name = name(&doc)?;
    let mut record = TrailRecord::bare(&name, url);

    record.region = single(&doc, url, "region", &REGION_CHAIN);

    (record.length, record.elevation_gain) = pair(&doc, url, "length/elevation gain", &LENGTH_GAIN_CHAIN);

    record.rating = single(&doc, url, "rating", &RATING_CHAIN);
    record.votes = single(&doc, url, "number_votes", &VOTES_CHAIN);
    record.reports = single(&doc, url, "numReports", &REPORTS_CHAIN);
    record.pass = single(&doc, url, "which_pass", &PASS_CHAIN);

    record.features = match first_present(&doc, &FEATURES_CHAIN) {
        Ok(tags) => Features::Tags(tags),
        Err(misses) => {
            debug!(url, field = "features", "NR: {}", describe(&misses));
            Features::NotReported
        }
    };

    (record.lat, record.long) = pair(&doc, url, "lat/long", &COORDS_CHAIN);

    Ok(record)
}

fn single(doc: &Html, url: &str, field: &str, chain: &[Strategy<String>]) -> Field {
    match first_present(doc, chain) {
        Ok(v) => Field::Reported(v),
        Err(misses) => {
            debug!(url, field, "NR: {}", describe(&misses));
            Field::NotReported
        }
    }
}

fn pair(doc: &Html, url: &str, field: &str, chain: &[Strategy<(String, String)>]) -> (Field, Field) {
    match first_present(doc, chain) {
        Ok((a, b)) => (Field::Reported(a), Field::Reported(b)),
        Err(misses) => {
            debug!(url, field, "NR: {}", describe(&misses));
            (Field::NotReported, Field::NotReported)
        }
    }
}

fn first<'a>(doc: &'a Html, selector: &Selector, css: &'static str) -> Result<ElementRef<'a>, MarkupError> {
    doc.select(selector).next().ok_or(MarkupError::Absent(css))
}

fn non_empty(text: String, css: &'static str) -> Result<String, MarkupError> {
    if text.is_empty() {
        Err(MarkupError::Empty(css))
    } else {
        Ok(text)
    }
}

/// Text of the first `inner` element under the first `outer` match.
fn nested_text(doc: &Html, outer: &Selector, outer_css: &'static str, inner: &Selector, inner_css: &'static str) -> Result<String, MarkupError> {
    let el = first(doc, outer, outer_css)?;
    let inner_el = el.select(inner).next().ok_or(MarkupError::Absent(inner_css))?;
    non_empty(text_of(inner_el), inner_css)
}

fn name(doc: &Html) -> Result<String, MarkupError> {
    non_empty(text_of(first(doc, &NAME_SEL, NAME)?), NAME)
}

fn region_from_stats(doc: &Html) -> Result<String, MarkupError> {
    nested_text(doc, &REGION_STAT_SEL, REGION_STAT, &DIV, "div[class=\"hike-stat grid_3 alpha\"] div")
}

fn region_from_banner(doc: &Html) -> Result<String, MarkupError> {
    nested_text(doc, &REGION_BANNER_SEL, REGION_BANNER, &SPAN, "div#hike-region span")
}

/// The first two stat blocks are length then gain; identity comes from
/// position, not from any label.
fn length_and_gain(doc: &Html) -> Result<(String, String), MarkupError> {
    let mut values = Vec::new();
    for block in doc.select(&STATS_SEL) {
        let span = block
            .select(&DIV)
            .next()
            .and_then(|div| div.select(&SPAN).next())
            .ok_or(MarkupError::Absent("div[class=\"hike-stat grid_3\"] div span"))?;
        values.push(non_empty(text_of(span), STATS)?);
    }
    if values.len() < 2 {
        return Err(MarkupError::Count {
            selector: STATS,
            expected: 2,
            found: values.len(),
        });
    }
    let mut values = values.into_iter();
    match (values.next(), values.next()) {
        (Some(length), Some(gain)) => Ok((length, gain)),
        _ => Err(MarkupError::Absent(STATS)),
    }
}

fn rating(doc: &Html) -> Result<String, MarkupError> {
    non_empty(text_of(first(doc, &RATING_SEL, RATING)?), RATING)
}

fn votes(doc: &Html) -> Result<String, MarkupError> {
    non_empty(text_of(first(doc, &VOTES_SEL, VOTES)?), VOTES)
}

fn reports(doc: &Html) -> Result<String, MarkupError> {
    non_empty(text_of(first(doc, &REPORTS_SEL, REPORTS)?), REPORTS)
}

fn pass(doc: &Html) -> Result<String, MarkupError> {
    nested_text(doc, &PASS_SEL, PASS, &ANCHOR, "div#pass-required-info a")
}

fn tag_titles<'a>(tags: impl Iterator<Item = ElementRef<'a>>) -> Result<Vec<String>, MarkupError> {
    tags.map(|tag| {
        tag.value()
            .attr("data-title")
            .map(|t| t.trim().to_string())
            .ok_or(MarkupError::MissingAttr {
                selector: FEATURE,
                attr: "data-title",
            })
    })
    .collect()
}

/// Tags inside the features box. A box with no tags is an empty list.
fn features_in_box(doc: &Html) -> Result<Vec<String>, MarkupError> {
    let container = first(doc, &FEATURE_BOX_SEL, FEATURE_BOX)?;
    tag_titles(container.select(&FEATURE_SEL))
}

/// Older pages carry the tags without the wrapping box.
fn features_anywhere(doc: &Html) -> Result<Vec<String>, MarkupError> {
    let tags = tag_titles(doc.select(&FEATURE_SEL))?;
    if tags.is_empty() {
        return Err(MarkupError::Absent(FEATURE));
    }
    Ok(tags)
}

fn coordinates(doc: &Html) -> Result<(String, String), MarkupError> {
    let link = first(doc, &MAP_LINK_SEL, MAP_LINK)?;
    let href = link.value().attr("href").ok_or(MarkupError::MissingAttr {
        selector: MAP_LINK,
        attr: "href",
    })?;
    Ok(coords::decode(href)?)
}
