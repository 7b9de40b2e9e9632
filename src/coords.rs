//! Latitude/longitude decoding from the "get directions" map link on a
//! trail page. The link looks like
//! `https://www.google.com/maps/dir//47.6062,-122.3321/@47.6,-122.3,15z/data=...?hl=en`:
//! the pair sits between the directions path and a `/@...en` tail.

use std::sync::LazyLock;

use regex::Regex;

pub const PREFIX: &str = "//www.google.com/maps/dir//";

static SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^/@\S+en$").unwrap());

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("map link has no directions marker: {0}")]
    MissingPrefix(String),
    #[error("map link has no /@...en tail: {0}")]
    MissingSuffix(String),
    #[error("expected \"lat,long\", got {0:?}")]
    Shape(String),
}

/// Pull the `(lat, long)` strings out of a map link, unchanged.
pub fn decode(map_url: &str) -> Result<(String, String), DecodeError> {
    let start = map_url
        .find(PREFIX)
        .ok_or_else(|| DecodeError::MissingPrefix(map_url.to_string()))?
        + PREFIX.len();

    // Qualifying tails nearest the end are tried first; the first one that
    // leaves exactly two components wins.
    let mut shape = None;
    for end in map_url[start..]
        .rmatch_indices("/@")
        .map(|(i, _)| start + i)
        .filter(|&i| SUFFIX_RE.is_match(&map_url[i..]))
    {
        let pair = &map_url[start..end];
        match split_pair(pair) {
            Some((lat, long)) => return Ok((lat.to_string(), long.to_string())),
            None => {
                shape.get_or_insert_with(|| pair.to_string());
            }
        }
    }

    Err(match shape {
        Some(pair) => DecodeError::Shape(pair),
        None => DecodeError::MissingSuffix(map_url.to_string()),
    })
}

fn split_pair(pair: &str) -> Option<(&str, &str)> {
    let (lat, long) = pair.split_once(',')?;
    if lat.is_empty() || long.is_empty() || long.contains(',') {
        return None;
    }
    Some((lat, long))
}
