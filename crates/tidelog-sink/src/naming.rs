//! Archive file naming and collision avoidance.
//!
//! # Design
//! - The naming scheme is a strategy value so alternative layouts need no sink changes.
//! - Probing is bounded; exhausting the candidates is an error, never an overwrite.
//! - Probes use `symlink_metadata` so a dangling link still counts as taken.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{SinkError, SinkResult};

/// Names probed per rotation: the candidate plus 99 numeric suffixes.
pub const MAX_NAME_ATTEMPTS: usize = 100;

/// Strategy computing the name a closed file is archived under.
pub trait FileNamer: Send + Sync {
    /// Archive name for `base` whose slot started at `label` (wall-clock time).
    fn archive_name(&self, base: &Path, label: NaiveDateTime) -> PathBuf;

    /// Alternative for an occupied `candidate`; `attempt` starts at 1.
    fn disambiguate(&self, candidate: &Path, attempt: usize) -> PathBuf {
        let mut name = candidate.as_os_str().to_os_string();
        name.push(format!(".{attempt}"));
        PathBuf::from(name)
    }
}

impl<F> FileNamer for F
where
    F: Fn(&Path, NaiveDateTime) -> PathBuf + Send + Sync,
{
    fn archive_name(&self, base: &Path, label: NaiveDateTime) -> PathBuf {
        self(base, label)
    }
}

/// `<stem>_<YYYY-MM-DD-HH-MM><.ext>` next to the base file.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntervalNamer;

impl FileNamer for IntervalNamer {
    fn archive_name(&self, base: &Path, label: NaiveDateTime) -> PathBuf {
        let stamp = label.format("%Y-%m-%d-%H-%M");
        let Some(name) = base.file_name().and_then(OsStr::to_str) else {
            let mut fallback = base.as_os_str().to_os_string();
            fallback.push(format!("_{stamp}"));
            return PathBuf::from(fallback);
        };
        let (stem, extension) = split_extension(name);
        base.with_file_name(format!("{stem}_{stamp}{extension}"))
    }
}

/// Split `name` before its last dot.
///
/// Hidden files (`.profile`) and names ending in a dot have no extension.
#[must_use]
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 && index + 1 < name.len() => name.split_at(index),
        _ => (name, ""),
    }
}

/// A free archive name and how many taken names were skipped to find it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    /// Path that did not exist when probed.
    pub path: PathBuf,
    /// Number of occupied candidates before it.
    pub collisions: usize,
}

/// Find the first free name among `candidate` and its disambiguations.
///
/// # Errors
///
/// Returns [`SinkError::NamesExhausted`] when all [`MAX_NAME_ATTEMPTS`] names
/// exist, or [`SinkError::Probe`] when a name cannot be checked.
pub fn resolve_archive_path<N>(namer: &N, candidate: &Path) -> SinkResult<ResolvedName>
where
    N: FileNamer + ?Sized,
{
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let path = if attempt == 0 {
            candidate.to_path_buf()
        } else {
            namer.disambiguate(candidate, attempt)
        };
        match fs::symlink_metadata(&path) {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(ResolvedName {
                    path,
                    collisions: attempt,
                });
            }
            Err(source) => return Err(SinkError::Probe { path, source }),
        }
    }
    Err(SinkError::NamesExhausted {
        candidate: candidate.to_path_buf(),
        attempts: MAX_NAME_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::error::Error;

    fn label() -> Result<NaiveDateTime, Box<dyn Error>> {
        Ok(NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|date| date.and_hms_opt(9, 5, 0))
            .ok_or("invalid label")?)
    }

    #[test]
    fn interval_names_keep_the_extension_last() -> Result<(), Box<dyn Error>> {
        let namer = IntervalNamer;
        assert_eq!(
            namer.archive_name(Path::new("logs/app.log"), label()?),
            PathBuf::from("logs/app_2024-05-01-09-05.log")
        );
        assert_eq!(
            namer.archive_name(Path::new("traffic-user-profile"), label()?),
            PathBuf::from("traffic-user-profile_2024-05-01-09-05")
        );
        assert_eq!(
            namer.archive_name(Path::new("/var/log/.hidden"), label()?),
            PathBuf::from("/var/log/.hidden_2024-05-01-09-05")
        );
        Ok(())
    }

    #[test]
    fn split_extension_follows_the_last_dot() {
        assert_eq!(split_extension("app.tar.gz"), ("app.tar", ".gz"));
        assert_eq!(split_extension("app."), ("app.", ""));
        assert_eq!(split_extension(".env"), (".env", ""));
        assert_eq!(split_extension("app"), ("app", ""));
    }

    #[test]
    fn closures_are_namers() -> Result<(), Box<dyn Error>> {
        let namer = |base: &Path, label: NaiveDateTime| {
            base.with_extension(label.format("%H%M.log").to_string())
        };
        assert_eq!(
            namer.archive_name(Path::new("app.log"), label()?),
            PathBuf::from("app.0905.log")
        );
        assert_eq!(
            namer.disambiguate(Path::new("app.0905.log"), 2),
            PathBuf::from("app.0905.log.2")
        );
        Ok(())
    }

    #[test]
    fn resolve_skips_taken_names() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let candidate = dir.path().join("app_2024-05-01-09-05.log");
        assert_eq!(resolve_archive_path(&IntervalNamer, &candidate)?.collisions, 0);

        fs::write(&candidate, "old")?;
        fs::write(dir.path().join("app_2024-05-01-09-05.log.1"), "older")?;
        let resolved = resolve_archive_path(&IntervalNamer, &candidate)?;
        assert_eq!(resolved.path, dir.path().join("app_2024-05-01-09-05.log.2"));
        assert_eq!(resolved.collisions, 2);
        Ok(())
    }

    #[test]
    fn resolve_gives_up_after_the_attempt_limit() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let candidate = dir.path().join("app.log");
        fs::write(&candidate, "")?;
        for attempt in 1..MAX_NAME_ATTEMPTS {
            fs::write(IntervalNamer.disambiguate(&candidate, attempt), "")?;
        }
        let err = resolve_archive_path(&IntervalNamer, &candidate).err();
        assert!(matches!(
            err,
            Some(SinkError::NamesExhausted {
                attempts: MAX_NAME_ATTEMPTS,
                ..
            })
        ));
        Ok(())
    }
}
