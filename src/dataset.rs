//! CSV inputs loaded once at startup.

use std::{fs::File, path::Path};

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::DatasetError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct YieldRecord {
    pub year: i64,
    pub area: String,
    /// Blank or non-numeric cells load as `None`; the row still counts
    /// toward the table's areas and years.
    #[serde(rename = "yield", deserialize_with = "csv::invalid_option")]
    pub yield_amount: Option<f64>,
}

/// Historical `(year, area, yield)` rows. Read-only after load.
#[derive(Debug, Clone, Default)]
pub struct YieldTable {
    records: Vec<YieldRecord>,
}

impl YieldTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DatasetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_reader(file).map_err(|source| DatasetError::Csv {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load the table, substituting an empty one when the file is absent or
    /// unreadable.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(table) => {
                info!(path = %path.display(), rows = table.len(), "loaded yield table");
                table
            }
            Err(err) => {
                warn!(error = %err, "yield table unavailable, continuing with an empty table");
                Self::default()
            }
        }
    }

    pub fn from_reader(reader: impl std::io::Read) -> Result<Self, csv::Error> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let records = csv_reader
            .deserialize::<YieldRecord>()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct areas in order of first appearance.
    pub fn areas(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for record in &self.records {
            if !seen.contains(&record.area) {
                seen.push(record.area.clone());
            }
        }
        seen
    }

    /// Distinct years in order of first appearance.
    pub fn years(&self) -> Vec<i64> {
        let mut seen = Vec::new();
        for record in &self.records {
            if !seen.contains(&record.year) {
                seen.push(record.year);
            }
        }
        seen
    }

    /// Mean yield for the area and year, falling back to the area's mean
    /// across all years.
    pub fn historical_mean(&self, area: &str, year: Option<i64>) -> Option<f64> {
        let exact = year.and_then(|year| {
            mean(
                self.records
                    .iter()
                    .filter(|r| r.area == area && r.year == year)
                    .filter_map(|r| r.yield_amount),
            )
        });
        exact.or_else(|| {
            mean(
                self.records
                    .iter()
                    .filter(|r| r.area == area)
                    .filter_map(|r| r.yield_amount),
            )
        })
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0_usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// The storm archive is only counted; nothing downstream reads its rows.
#[derive(Debug, Clone, Default)]
pub struct StormArchive {
    pub columns: Vec<String>,
    pub rows: usize,
}

impl StormArchive {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DatasetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let csv_error = |source| DatasetError::Csv {
            path: path.display().to_string(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
        let columns = reader
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(str::to_string)
            .collect();
        let mut rows = 0;
        for record in reader.records() {
            record.map_err(csv_error)?;
            rows += 1;
        }
        info!(path = %path.display(), rows, "loaded storm archive");
        Ok(Self { columns, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "year,area,yield\n\
        2021,North,3000\n\
        2020,South,2500\n\
        2020,North,3400\n\
        2021,North,3200\n";

    #[test]
    fn parses_rows_and_ignores_extra_columns() {
        let table = YieldTable::from_reader("area,year,yield,notes\nEast, 2019 ,1200.5,dry\n".as_bytes())
            .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.areas(), vec!["East"]);
        assert_eq!(table.years(), vec![2019]);
        assert_eq!(table.historical_mean("East", Some(2019)), Some(1200.5));
    }

    #[test]
    fn blank_yield_cells_keep_their_rows() {
        let csv = "year,area,yield\n2020,Leyte,3120\n2021,Albay,\n2021,Leyte,n/a\n";
        let table = YieldTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.areas(), vec!["Leyte", "Albay"]);
        assert_eq!(table.years(), vec![2020, 2021]);
        assert_eq!(table.historical_mean("Leyte", Some(2021)), Some(3120.0));
        assert_eq!(table.historical_mean("Albay", Some(2021)), None);
    }

    #[test]
    fn unique_values_keep_first_appearance_order() {
        let table = YieldTable::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.areas(), vec!["North", "South"]);
        assert_eq!(table.years(), vec![2021, 2020]);
    }

    #[test]
    fn historical_mean_prefers_exact_year() {
        let table = YieldTable::from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.historical_mean("North", Some(2021)), Some(3100.0));
        assert_eq!(table.historical_mean("North", Some(1999)), Some(3200.0));
        assert_eq!(table.historical_mean("North", None), Some(3200.0));
        assert_eq!(table.historical_mean("West", Some(2021)), None);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let table = YieldTable::load_or_empty(dir.path().join("absent.csv"));
        assert!(table.is_empty());
    }

    #[test]
    fn malformed_file_loads_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "year,area,yield\nnot-a-year,North,12").unwrap();
        assert!(YieldTable::load(file.path()).is_err());
        assert!(YieldTable::load_or_empty(file.path()).is_empty());
    }

    #[test]
    fn storm_archive_counts_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "date,name,wind_kph\n2020-11-01,Goni,315\n2013-11-08,Haiyan,").unwrap();
        let archive = StormArchive::load(file.path()).unwrap();
        assert_eq!(archive.columns, vec!["date", "name", "wind_kph"]);
        assert_eq!(archive.rows, 2);
    }

    #[test]
    fn storm_archive_requires_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = StormArchive::load(dir.path().join("storms.csv")).unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
    }
}
