//! CSV run reports appended by benchmark harnesses.
//!
//! One row per run: `name, creation_time, search_time, granularity, max_x,
//! max_y` followed by any extra columns. Times are whole microseconds. The
//! header is written only when the file is created.

use crate::error::{FastError, Result};
use crate::index::FastIndex;
use std::fs::OpenOptions;
use std::path::Path;
use std::time::{Duration, Instant};

const BASE_COLUMNS: [&str; 6] = ["name", "creation_time", "search_time", "granularity", "max_x", "max_y"];

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub name: String,
    pub creation_time: Duration,
    pub search_time: Duration,
    pub granularity: u32,
    pub max_x: f64,
    pub max_y: f64,
    /// Extra `(column, value)` pairs appended after the base columns.
    pub extras: Vec<(String, String)>,
}

impl RunReport {
    /// Report for a run against `index`, with zero timings.
    pub fn for_index(name: impl Into<String>, index: &FastIndex) -> Self {
        let bounds = index.bounds();
        Self {
            name: name.into(),
            creation_time: Duration::ZERO,
            search_time: Duration::ZERO,
            granularity: index.context().granularity(),
            max_x: bounds.max_x(),
            max_y: bounds.max_y(),
            extras: Vec::new(),
        }
    }

    pub fn with_extra(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.extras.push((column.into(), value.to_string()));
        self
    }

    /// Run `f`, adding its wall time to `creation_time`.
    pub fn time_creation<T>(&mut self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.creation_time += start.elapsed();
        out
    }

    /// Run `f`, adding its wall time to `search_time`.
    pub fn time_search<T>(&mut self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.search_time += start.elapsed();
        out
    }

    pub fn header(&self) -> Vec<String> {
        BASE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.extras.iter().map(|(column, _)| column.clone()))
            .collect()
    }

    pub fn record(&self) -> Vec<String> {
        let mut record = vec![
            self.name.clone(),
            self.creation_time.as_micros().to_string(),
            self.search_time.as_micros().to_string(),
            self.granularity.to_string(),
            self.max_x.to_string(),
            self.max_y.to_string(),
        ];
        record.extend(self.extras.iter().map(|(_, value)| value.clone()));
        record
    }

    /// Append this report to the CSV file at `path`.
    ///
    /// # Errors
    ///
    /// `InvalidOutput` if `path` is a directory; nothing is written then.
    pub fn append_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if path.is_dir() {
            return Err(FastError::InvalidOutput(path.to_path_buf()));
        }

        let is_new = !path.exists();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(self.header())?;
        }
        writer.write_record(self.record())?;
        writer.flush()?;

        log::info!("Appended run '{}' to {}", self.name, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spatio_fast_types::Rectangle;
    use tempfile::TempDir;

    fn report() -> RunReport {
        let index = FastIndex::new(Rectangle::new(0.0, 0.0, 10.0, 20.0), 8).unwrap();
        let mut report = RunReport::for_index("toy", &index).with_extra("queries", 13);
        report.creation_time = Duration::from_micros(1500);
        report.search_time = Duration::from_millis(2);
        report
    }

    #[test]
    fn test_record_layout() {
        let report = report();
        assert_eq!(
            report.header(),
            vec!["name", "creation_time", "search_time", "granularity", "max_x", "max_y", "queries"]
        );
        assert_eq!(report.record(), vec!["toy", "1500", "2000", "8", "10", "20", "13"]);
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runs.csv");

        report().append_to(&path).unwrap();
        report().append_to(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "name,creation_time,search_time,granularity,max_x,max_y,queries");
        assert_eq!(lines[1], "toy,1500,2000,8,10,20,13");
        assert_eq!(lines[1], lines[2]);
    }

    #[test]
    fn test_directory_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = report().append_to(dir.path()).unwrap_err();
        assert!(matches!(err, FastError::InvalidOutput(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_timers_accumulate() {
        let mut report = report();
        let before = report.search_time;
        let value = report.time_search(|| 41 + 1);
        assert_eq!(value, 42);
        assert!(report.search_time >= before);
    }
}
