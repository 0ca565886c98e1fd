//! File-backed catalog cache.
//!
//! Readers always observe one complete [`Catalog`]: a refresh parses the
//! whole file first and then replaces the shared snapshot with a single
//! atomic pointer swap. Readers that arrive while another thread is
//! reloading keep using the previous snapshot instead of waiting.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use std::time::SystemTime;

use crate::{Catalog, CatalogError};

#[derive(Debug)]
pub struct CatalogStore {
    path: PathBuf,
    current: ArcSwap<Catalog>,
    loaded_mtime: Mutex<Option<SystemTime>>,
}

impl CatalogStore {
    /// A missing file is an empty catalog, not an error.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = Self {
            path: path.into(),
            current: ArcSwap::from_pointee(Catalog::default()),
            loaded_mtime: Mutex::new(None),
        };
        store.refresh_if_stale();
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Arc<Catalog> {
        self.refresh_if_stale();
        self.current.load_full()
    }

    pub fn reload(&self) -> Result<Arc<Catalog>, CatalogError> {
        let mut loaded = self.loaded_mtime.lock();
        let modified = std::fs::metadata(&self.path)?.modified()?;
        let catalog = Arc::new(read_catalog(&self.path)?);
        self.current.store(Arc::clone(&catalog));
        *loaded = Some(modified);
        Ok(catalog)
    }

    fn refresh_if_stale(&self) {
        let Some(mut loaded) = self.loaded_mtime.try_lock() else {
            return;
        };

        let modified = match std::fs::metadata(&self.path).and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                if loaded.take().is_some() {
                    warn!(path = ?self.path, "catalog file disappeared, using empty catalog");
                    self.current.store(Arc::new(Catalog::default()));
                }
                return;
            }
            Err(err) => {
                warn!(path = ?self.path, error = %err, "failed to stat catalog file");
                return;
            }
        };

        if loaded.is_some_and(|previous| modified <= previous) {
            return;
        }

        match read_catalog(&self.path) {
            Ok(catalog) => {
                debug!(path = ?self.path, "loaded catalog");
                self.current.store(Arc::new(catalog));
                *loaded = Some(modified);
            }
            Err(err) => {
                warn!(
                    path = ?self.path,
                    error = %err,
                    "error loading catalog, keeping previous snapshot"
                );
            }
        }
    }
}

fn read_catalog(path: &Path) -> Result<Catalog, CatalogError> {
    let text = std::fs::read_to_string(path)?;
    Catalog::from_json(&text)
}
