use std::fmt;

/// Literal written in place of any field the page did not report.
pub const NOT_REPORTED: &str = "NR";

/// Output columns, in file order. The leading index column has no header.
pub const COLUMNS: [&str; 12] = [
    "hike_name",
    "region",
    "length",
    "elevation gain",
    "rating",
    "number_votes",
    "features",
    "which_pass",
    "lat",
    "long",
    "numReports",
    "url",
];

/// A single optional text field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field {
    Reported(String),
    #[default]
    NotReported,
}

impl Field {
    /// Empty or whitespace-only text counts as not reported.
    pub fn from_text(text: &str) -> Self {
        let t = text.trim();
        if t.is_empty() {
            Field::NotReported
        } else {
            Field::Reported(t.to_string())
        }
    }

    /// Reads a stored cell back. `NR` and empty cells are both absent.
    pub fn from_cell(cell: &str) -> Self {
        if cell == NOT_REPORTED {
            Field::NotReported
        } else {
            Field::from_text(cell)
        }
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            Field::Reported(s) => Some(s),
            Field::NotReported => None,
        }
    }

    pub fn is_reported(&self) -> bool {
        matches!(self, Field::Reported(_))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_deref().unwrap_or(NOT_REPORTED))
    }
}

/// Feature tags. An empty `Tags` means the scan ran and found nothing,
/// which is not the same as the scan failing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Features {
    Tags(Vec<String>),
    #[default]
    NotReported,
}

impl Features {
    pub fn to_cell(&self) -> String {
        match self {
            Features::Tags(tags) => serde_json::to_string(tags).unwrap_or_else(|_| "[]".into()),
            Features::NotReported => NOT_REPORTED.to_string(),
        }
    }

    pub fn from_cell(cell: &str) -> Result<Self, serde_json::Error> {
        let cell = cell.trim();
        if cell.is_empty() || cell == NOT_REPORTED {
            return Ok(Features::NotReported);
        }
        serde_json::from_str(cell).map(Features::Tags)
    }

    pub fn is_reported(&self) -> bool {
        matches!(self, Features::Tags(_))
    }
}

/// One row of the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailRecord {
    pub name: String,
    pub region: Field,
    pub length: Field,
    pub elevation_gain: Field,
    pub rating: Field,
    pub votes: Field,
    pub features: Features,
    pub pass: Field,
    pub lat: Field,
    pub long: Field,
    pub reports: Field,
    pub url: String,
}

impl TrailRecord {
    /// A record with only the two mandatory fields set.
    pub fn bare(name: &str, url: &str) -> Self {
        TrailRecord {
            name: name.to_string(),
            region: Field::NotReported,
            length: Field::NotReported,
            elevation_gain: Field::NotReported,
            rating: Field::NotReported,
            votes: Field::NotReported,
            features: Features::NotReported,
            pass: Field::NotReported,
            lat: Field::NotReported,
            long: Field::NotReported,
            reports: Field::NotReported,
            url: url.to_string(),
        }
    }

    /// Cells in `COLUMNS` order.
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.region.to_string(),
            self.length.to_string(),
            self.elevation_gain.to_string(),
            self.rating.to_string(),
            self.votes.to_string(),
            self.features.to_cell(),
            self.pass.to_string(),
            self.lat.to_string(),
            self.long.to_string(),
            self.reports.to_string(),
            self.url.clone(),
        ]
    }

    /// Which optional columns hold the sentinel, by column name.
    pub fn unreported_columns(&self) -> Vec<&'static str> {
        let flags = [
            (COLUMNS[1], self.region.is_reported()),
            (COLUMNS[2], self.length.is_reported()),
            (COLUMNS[3], self.elevation_gain.is_reported()),
            (COLUMNS[4], self.rating.is_reported()),
            (COLUMNS[5], self.votes.is_reported()),
            (COLUMNS[6], self.features.is_reported()),
            (COLUMNS[7], self.pass.is_reported()),
            (COLUMNS[8], self.lat.is_reported()),
            (COLUMNS[9], self.long.is_reported()),
            (COLUMNS[10], self.reports.is_reported()),
        ];
        flags
            .into_iter()
            .filter(|(_, reported)| !reported)
            .map(|(col, _)| col)
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let features = match &self.features {
            Features::Tags(tags) => serde_json::json!(tags),
            Features::NotReported => serde_json::json!(NOT_REPORTED),
        };
        serde_json::json!({
            "hike_name": self.name,
            "region": self.region.to_string(),
            "length": self.length.to_string(),
            "elevation gain": self.elevation_gain.to_string(),
            "rating": self.rating.to_string(),
            "number_votes": self.votes.to_string(),
            "features": features,
            "which_pass": self.pass.to_string(),
            "lat": self.lat.to_string(),
            "long": self.long.to_string(),
            "numReports": self.reports.to_string(),
            "url": self.url,
        })
    }
}
