//! Lifecycle callbacks around the active file.
//!
//! Hooks observe the file; they cannot veto an open, close or rotation.
//! `after_open` receives the handle, so it can write a header or adjust
//! permissions before the first record lands.

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

type PathHook = Arc<dyn Fn(&Path) + Send + Sync>;
type FileHook = Arc<dyn Fn(&Path, &File) + Send + Sync>;
type RotateHook = Arc<dyn Fn(&Path, Option<&Path>) + Send + Sync>;

/// Optional callbacks invoked as the sink opens, closes and rotates files.
#[derive(Clone, Default)]
pub struct FileEventHandlers {
    before_open: Option<PathHook>,
    after_open: Option<FileHook>,
    before_close: Option<FileHook>,
    after_close: Option<PathHook>,
    after_rotate: Option<RotateHook>,
}

impl FileEventHandlers {
    /// Called with the path about to be opened.
    #[must_use]
    pub fn before_open(mut self, hook: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.before_open = Some(Arc::new(hook));
        self
    }

    /// Called with the freshly opened file.
    #[must_use]
    pub fn after_open(mut self, hook: impl Fn(&Path, &File) + Send + Sync + 'static) -> Self {
        self.after_open = Some(Arc::new(hook));
        self
    }

    /// Called with the file about to be closed, after its final flush.
    #[must_use]
    pub fn before_close(mut self, hook: impl Fn(&Path, &File) + Send + Sync + 'static) -> Self {
        self.before_close = Some(Arc::new(hook));
        self
    }

    /// Called with the path of a file that was just closed.
    #[must_use]
    pub fn after_close(mut self, hook: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.after_close = Some(Arc::new(hook));
        self
    }

    /// Called after a rotation with the base path and the archive name, or
    /// `None` when the initial file was discarded.
    #[must_use]
    pub fn after_rotate(
        mut self,
        hook: impl Fn(&Path, Option<&Path>) + Send + Sync + 'static,
    ) -> Self {
        self.after_rotate = Some(Arc::new(hook));
        self
    }

    pub(crate) fn on_before_open(&self, path: &Path) {
        if let Some(hook) = &self.before_open {
            hook(path);
        }
    }

    pub(crate) fn on_after_open(&self, path: &Path, file: &File) {
        if let Some(hook) = &self.after_open {
            hook(path, file);
        }
    }

    pub(crate) fn on_before_close(&self, path: &Path, file: &File) {
        if let Some(hook) = &self.before_close {
            hook(path, file);
        }
    }

    pub(crate) fn on_after_close(&self, path: &Path) {
        if let Some(hook) = &self.after_close {
            hook(path);
        }
    }

    pub(crate) fn on_after_rotate(&self, base: &Path, archived: Option<&Path>) {
        if let Some(hook) = &self.after_rotate {
            hook(base, archived);
        }
    }
}

impl fmt::Debug for FileEventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileEventHandlers")
            .field("before_open", &self.before_open.is_some())
            .field("after_open", &self.after_open.is_some())
            .field("before_close", &self.before_close.is_some())
            .field("after_close", &self.after_close.is_some())
            .field("after_rotate", &self.after_rotate.is_some())
            .finish()
    }
}
