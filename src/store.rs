//! The dataset file: one CSV, read whole before a run and rewritten whole
//! after it. The first column is an unnamed row index.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::dataset::Dataset;
use crate::record::{Features, Field, TrailRecord, COLUMNS};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{path} has no hike_name column")]
    NoNameColumn { path: PathBuf },
    #[error("{path} record {record}: {reason}")]
    Row {
        path: PathBuf,
        record: usize,
        reason: String,
    },
}

/// Load the dataset at `path`. A missing file is an empty dataset.
///
/// Files without an index column get positional indices. Columns the file
/// lacks (older files have no `url`) read as empty.
pub fn load(path: &Path) -> Result<Dataset, StoreError> {
    if !path.exists() {
        info!("No dataset at {}, starting empty", path.display());
        return Ok(Dataset::new());
    }
    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    let position: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h.as_str(), i)).collect();
    let index_col = headers
        .first()
        .filter(|h| h.is_empty() || h.starts_with("Unnamed"))
        .map(|_| 0);
    if !position.contains_key(COLUMNS[0]) {
        return Err(StoreError::NoNameColumn {
            path: path.to_path_buf(),
        });
    }

    let mut dataset = Dataset::new();
    for (n, result) in reader.records().enumerate() {
        let row = result.map_err(csv_err)?;
        let bad = |reason: String| StoreError::Row {
            path: path.to_path_buf(),
            record: n + 1,
            reason,
        };
        let cell = |col: &str| position.get(col).and_then(|&i| row.get(i)).unwrap_or("");

        let index = match index_col {
            Some(i) => {
                let raw = row.get(i).unwrap_or("").trim();
                parse_index(raw).ok_or_else(|| bad(format!("bad row index {:?}", raw)))?
            }
            None => n,
        };

        // Rows padded in by earlier tools have no name; they are gaps.
        let name = cell(COLUMNS[0]).trim();
        if name.is_empty() {
            continue;
        }

        let features = Features::from_cell(cell(COLUMNS[6])).map_err(|e| bad(format!("bad features cell: {}", e)))?;
        let record = TrailRecord {
            name: name.to_string(),
            region: Field::from_cell(cell(COLUMNS[1])),
            length: Field::from_cell(cell(COLUMNS[2])),
            elevation_gain: Field::from_cell(cell(COLUMNS[3])),
            rating: Field::from_cell(cell(COLUMNS[4])),
            votes: Field::from_cell(cell(COLUMNS[5])),
            features,
            pass: Field::from_cell(cell(COLUMNS[7])),
            lat: Field::from_cell(cell(COLUMNS[8])),
            long: Field::from_cell(cell(COLUMNS[9])),
            reports: Field::from_cell(cell(COLUMNS[10])),
            url: cell(COLUMNS[11]).trim().to_string(),
        };
        dataset.insert(index, record);
    }

    info!("Loaded {} rows from {}", dataset.len(), path.display());
    Ok(dataset)
}

/// Row indices are whole and non-negative. Some tools write them as `3.0`.
fn parse_index(raw: &str) -> Option<usize> {
    if let Ok(i) = raw.parse::<usize>() {
        return Some(i);
    }
    let f = raw.parse::<f64>().ok()?;
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64).then_some(f as usize)
}

/// Rewrite the whole file. Writes a sibling temp file first and renames it
/// into place so a crash never leaves a half-written dataset.
pub fn save(path: &Path, dataset: &Dataset) -> Result<(), StoreError> {
    let tmp = path.with_extension("csv.tmp");
    let csv_err = |source| StoreError::Csv {
        path: tmp.clone(),
        source,
    };

    let mut writer = csv::Writer::from_path(&tmp).map_err(csv_err)?;
    let mut header = vec![""];
    header.extend(COLUMNS);
    writer.write_record(&header).map_err(csv_err)?;

    for (index, record) in dataset.iter() {
        let mut cells = vec![index.to_string()];
        cells.extend(record.to_cells());
        writer.write_record(&cells).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| StoreError::Io {
        path: tmp.clone(),
        source,
    })?;
    drop(writer);

    fs::rename(&tmp, path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Wrote {} rows to {}", dataset.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        let mut full = TrailRecord::bare("Mount Pilchuck — Café Loop", "https://www.wta.org/go-hiking/hikes/mount-pilchuck");
        full.region = Field::Reported("North Cascades -- Mountain Loop Highway".into());
        full.length = Field::Reported("5.4 miles, roundtrip".into());
        full.elevation_gain = Field::Reported("2300 feet".into());
        full.rating = Field::Reported("4.12".into());
        full.votes = Field::Reported("(41 votes)".into());
        full.features = Features::Tags(vec!["Summits".into(), "Fire tower, \"lookout\"".into()]);
        full.pass = Field::Reported("Northwest Forest Pass".into());
        full.lat = Field::Reported("48.0575".into());
        full.long = Field::Reported("-121.7970".into());
        full.reports = Field::Reported("612".into());

        let mut empty_features = TrailRecord::bare("Lac Léman", "https://www.wta.org/go-hiking/hikes/lac");
        empty_features.features = Features::Tags(vec![]);

        let mut ds = Dataset::new();
        ds.insert(0, full);
        ds.insert(1, TrailRecord::bare("Bare Trail", "https://www.wta.org/go-hiking/hikes/bare"));
        ds.insert(5, empty_features);
        ds
    }

    #[test]
    fn save_then_load_keeps_rows_and_sentinels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("washington_hikes.csv");
        let ds = sample();
        save(&path, &ds).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, ds);
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[test]
    fn file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        save(&path, &sample()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            ",hike_name,region,length,elevation gain,rating,number_votes,features,which_pass,lat,long,numReports,url"
        );
        assert!(text.contains("1,Bare Trail,NR,NR,NR,NR,NR,NR,NR,NR,NR,NR,https://www.wta.org/go-hiking/hikes/bare"));
        assert!(text.contains("5,Lac Léman,NR,NR,NR,NR,NR,[],NR"));
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("nope.csv")).unwrap().is_empty());
    }

    #[test]
    fn seed_file_without_index_or_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.csv");
        fs::write(
            &path,
            "hike_name,region,length,elevation gain,rating,number_votes,features,which_pass,lat,long,numReports\n\
             Lake 22,NR,5.4 miles,1350 feet,4.1,(20 votes),[],NR,48.0,-121.7,300\n\
             ,,,,,,,,,,\n\
             Heather Lake,NR,NR,NR,NR,NR,NR,NR,NR,NR,NR\n",
        )
        .unwrap();
        let ds = load(&path).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.get(0).unwrap().name, "Lake 22");
        assert_eq!(ds.get(0).unwrap().url, "");
        assert!(ds.get(1).is_none());
        assert_eq!(ds.get(2).unwrap().name, "Heather Lake");
    }

    #[test]
    fn bad_features_cell_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, ",hike_name,features\n0,Lake 22,['Lakes']\n").unwrap();
        assert!(matches!(load(&path), Err(StoreError::Row { record: 1, .. })));
    }

    #[test]
    fn index_column_accepts_whole_floats_only() {
        assert_eq!(parse_index("7"), Some(7));
        assert_eq!(parse_index("7.0"), Some(7));
        assert_eq!(parse_index("-1.0"), None);
        assert_eq!(parse_index("2.7"), None);
        assert_eq!(parse_index("NaN"), None);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fractional.csv");
        fs::write(&path, ",hike_name\n0,Lake 22\n2.7,Heather Lake\n").unwrap();
        assert!(matches!(load(&path), Err(StoreError::Row { record: 2, .. })));
    }
}
