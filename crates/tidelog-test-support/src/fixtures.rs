//! Test fixtures for rotation suites.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

/// Temporary directory holding one test's log files.
#[derive(Debug)]
pub struct LogDir {
    dir: TempDir,
}

impl LogDir {
    /// Create a fresh, empty directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("tidelog-")
            .tempdir()
            .context("failed to create temporary log directory")?;
        Ok(Self { dir })
    }

    /// Root of the directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `name` inside the directory.
    #[must_use]
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Sorted names of every entry in the directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn entries(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.dir.path()).context("failed to list log directory")? {
            let entry = entry.context("failed to read directory entry")?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Contents of `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read as UTF-8.
    pub fn read(&self, name: &str) -> Result<String> {
        let path = self.file(name);
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))
    }

    /// Non-empty lines of `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read as UTF-8.
    pub fn lines(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .read(name)?
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Create (or overwrite) `name` with `contents`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.file(name);
        fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// UTC instant on the given calendar day.
///
/// # Errors
///
/// Returns an error for out-of-range components.
pub fn utc(
    (year, month, day): (i32, u32, u32),
    (hour, minute, second): (u32, u32, u32),
) -> Result<DateTime<Utc>> {
    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .with_context(|| format!("invalid instant {year}-{month}-{day} {hour}:{minute}:{second}"))?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// UTC instant on 2024-05-01, a day without daylight-saving transitions.
///
/// # Errors
///
/// Returns an error for out-of-range components.
pub fn at(hour: u32, minute: u32, second: u32) -> Result<DateTime<Utc>> {
    utc((2024, 5, 1), (hour, minute, second))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_dir_lists_entries_sorted() -> Result<()> {
        let dir = LogDir::new()?;
        dir.write("b.log", "two\n\n")?;
        dir.write("a.log", "one\n")?;
        assert_eq!(dir.entries()?, ["a.log", "b.log"]);
        assert_eq!(dir.lines("b.log")?, ["two"]);
        assert!(dir.read("missing.log").is_err());
        Ok(())
    }

    #[test]
    fn instants_reject_invalid_components() -> Result<()> {
        assert_eq!(at(12, 0, 30)?.to_rfc3339(), "2024-05-01T12:00:30+00:00");
        assert!(at(24, 0, 0).is_err());
        assert!(utc((2024, 2, 30), (0, 0, 0)).is_err());
        Ok(())
    }
}
