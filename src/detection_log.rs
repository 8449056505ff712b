//! Append-only detection log.
//!
//! One row per logged gate decision: the label and a local wall-clock
//! timestamp without offset, comma separated. Suppressed frames never reach
//! this file.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Timestamp layout of a log row, ISO-8601 without offset.
const ROW_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub struct DetectionLog {
    file: Mutex<File>,
}

impl DetectionLog {
    /// Open the log for appending, creating it if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open detection log {}", path.display()))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Append one row. `at` is local wall-clock time, second resolution.
    pub fn append(&self, label: &str, at: NaiveDateTime) -> Result<()> {
        let mut file = self.file.lock().unwrap();
        writeln!(file, "{},{}", label, at.format(ROW_TIME_FORMAT))
            .context("failed to append detection log row")?;
        file.flush().context("failed to flush detection log")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 10, 2)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_rows_append_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detections.log");

        let log = DetectionLog::open(&path).unwrap();
        log.append("cat", at(15, 54, 54)).unwrap();
        log.append("squirrel", at(16, 2, 7)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "cat,2024-10-02T15:54:54\nsquirrel,2024-10-02T16:02:07\n");
    }

    #[test]
    fn test_reopen_preserves_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detections.log");

        DetectionLog::open(&path)
            .unwrap()
            .append("cat", at(15, 54, 54))
            .unwrap();
        DetectionLog::open(&path)
            .unwrap()
            .append("dog", at(15, 55, 0))
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.starts_with("cat,"));
    }
}
