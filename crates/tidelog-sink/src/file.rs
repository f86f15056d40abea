//! The open handle behind the base path.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tidelog_config::Durability;

use crate::error::{SinkError, SinkResult};
use crate::events::FileEventHandlers;

#[derive(Debug)]
pub(crate) struct ActiveFile {
    path: PathBuf,
    file: File,
    durability: Durability,
}

impl ActiveFile {
    pub(crate) fn open(
        path: &Path,
        truncate: bool,
        durability: Durability,
        handlers: &FileEventHandlers,
    ) -> SinkResult<Self> {
        let open_error = |source| SinkError::Open {
            path: path.to_path_buf(),
            source,
        };
        handlers.on_before_open(path);
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_error)?;
        }

        let mut options = OpenOptions::new();
        if truncate {
            options.write(true).create(true).truncate(true);
        } else {
            options.append(true).create(true);
        }
        let file = options.open(path).map_err(open_error)?;
        handlers.on_after_open(path, &file);

        Ok(Self {
            path: path.to_path_buf(),
            file,
            durability,
        })
    }

    /// Unreadable metadata counts as non-empty so the file is archived, not deleted.
    pub(crate) fn is_empty(&self) -> bool {
        self.file
            .metadata()
            .is_ok_and(|metadata| metadata.len() == 0)
    }

    pub(crate) fn append(&mut self, bytes: &[u8]) -> SinkResult<()> {
        self.file
            .write_all(bytes)
            .map_err(|source| SinkError::Write {
                path: self.path.clone(),
                source,
            })
    }

    pub(crate) fn flush(&mut self) -> SinkResult<()> {
        let result = match self.durability {
            Durability::Flush => self.file.flush(),
            Durability::Sync => self.file.flush().and_then(|()| self.file.sync_data()),
        };
        result.map_err(|source| SinkError::Flush {
            path: self.path.clone(),
            source,
        })
    }

    pub(crate) fn close(self, handlers: &FileEventHandlers) {
        handlers.on_before_close(&self.path, &self.file);
        let Self { path, file, .. } = self;
        drop(file);
        handlers.on_after_close(&path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::sync::{Arc, Mutex};

    #[test]
    fn open_creates_parents_and_appends_by_default() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/deeper/app.log");
        let handlers = FileEventHandlers::default();

        let mut file = ActiveFile::open(&path, false, Durability::Sync, &handlers)?;
        assert!(file.is_empty());
        file.append(b"first\n")?;
        file.flush()?;
        file.close(&handlers);

        let mut reopened = ActiveFile::open(&path, false, Durability::Flush, &handlers)?;
        assert!(!reopened.is_empty());
        reopened.append(b"second\n")?;
        reopened.flush()?;
        assert_eq!(fs::read_to_string(&path)?, "first\nsecond\n");
        Ok(())
    }

    #[test]
    fn truncate_discards_previous_contents() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("app.log");
        fs::write(&path, "stale\n")?;
        let file = ActiveFile::open(&path, true, Durability::Flush, &FileEventHandlers::default())?;
        assert!(file.is_empty());
        Ok(())
    }

    #[test]
    fn hooks_run_in_lifecycle_order() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("app.log");
        let calls = Arc::new(Mutex::new(Vec::new()));
        let record = |name: &'static str| {
            let calls = Arc::clone(&calls);
            move || calls.lock().map(|mut calls| calls.push(name)).unwrap_or(())
        };
        let (a, b, c, d) = (
            record("before_open"),
            record("after_open"),
            record("before_close"),
            record("after_close"),
        );
        let handlers = FileEventHandlers::default()
            .before_open(move |_| a())
            .after_open(move |_, mut file| {
                b();
                let _ = file.write_all(b"# header\n");
            })
            .before_close(move |_, _| c())
            .after_close(move |_| d());

        let file = ActiveFile::open(&path, true, Durability::Flush, &handlers)?;
        assert!(!file.is_empty());
        file.close(&handlers);

        assert_eq!(
            *calls.lock().map_err(|_| "poisoned")?,
            ["before_open", "after_open", "before_close", "after_close"]
        );
        assert_eq!(fs::read_to_string(&path)?, "# header\n");
        Ok(())
    }

    #[test]
    fn open_failure_names_the_path() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "")?;
        let path = blocker.join("app.log");
        let err = ActiveFile::open(&path, false, Durability::Flush, &FileEventHandlers::default())
            .err();
        assert!(matches!(err, Some(SinkError::Open { path: failed, .. }) if failed == path));
        Ok(())
    }
}
