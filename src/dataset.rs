use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::record::TrailRecord;

/// Rows keyed by crawl position. Gaps are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    rows: BTreeMap<usize, TrailRecord>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the row previously stored at `row`, if any.
    pub fn insert(&mut self, row: usize, record: TrailRecord) -> Option<TrailRecord> {
        self.rows.insert(row, record)
    }

    pub fn get(&self, row: usize) -> Option<&TrailRecord> {
        self.rows.get(&row)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &TrailRecord)> {
        self.rows.iter().map(|(i, r)| (*i, r))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AlignmentError {
    #[error("row {0} was already settled in this run")]
    Duplicate(usize),
    #[error("row {row} arrived after row {last}")]
    OutOfOrder { row: usize, last: usize },
}

/// Sole owner of the dataset during a run.
///
/// Row indices handed to [`commit`](Self::commit) and [`skip`](Self::skip)
/// must strictly increase within a run; a repeat or a step backwards is an
/// [`AlignmentError`]. Forward gaps are accepted (a short listing page
/// leaves one) and logged. Rows loaded from an earlier run are overwritten
/// by a commit at the same index and left alone by a skip.
#[derive(Debug)]
pub struct DatasetAccumulator {
    dataset: Dataset,
    last: Option<usize>,
    committed: usize,
    skipped: Vec<(usize, String)>,
}

impl DatasetAccumulator {
    pub fn new(dataset: Dataset) -> Self {
        DatasetAccumulator {
            dataset,
            last: None,
            committed: 0,
            skipped: Vec::new(),
        }
    }

    fn advance(&mut self, row: usize) -> Result<(), AlignmentError> {
        match self.last {
            Some(last) if row == last => return Err(AlignmentError::Duplicate(row)),
            Some(last) if row < last => return Err(AlignmentError::OutOfOrder { row, last }),
            Some(last) if row > last + 1 => warn!("Rows {}..{} were not crawled this run", last + 1, row),
            _ => {}
        }
        self.last = Some(row);
        Ok(())
    }

    pub fn commit(&mut self, row: usize, record: TrailRecord) -> Result<(), AlignmentError> {
        self.advance(row)?;
        if let Some(old) = self.dataset.insert(row, record) {
            debug!("Row {} replaced (was {})", row, old.name);
        }
        self.committed += 1;
        Ok(())
    }

    /// Consume `row` without a record, keeping whatever was stored there.
    pub fn skip(&mut self, row: usize, reason: impl Into<String>) -> Result<(), AlignmentError> {
        self.advance(row)?;
        self.skipped.push((row, reason.into()));
        Ok(())
    }

    pub fn snapshot(&self) -> Dataset {
        self.dataset.clone()
    }

    /// Highest row settled this run.
    pub fn last_row(&self) -> Option<usize> {
        self.last
    }

    pub fn committed(&self) -> usize {
        self.committed
    }

    pub fn skipped(&self) -> &[(usize, String)] {
        &self.skipped
    }
}
