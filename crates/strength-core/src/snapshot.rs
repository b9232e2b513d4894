// Dataset snapshots with reload keyed on the source's modification time.
//
// Each load produces a fresh `Arc<Dataset>`. Readers holding an older
// snapshot keep it unchanged; the cache only swaps its own reference.

use crate::dataset::{load_dataset, resolve_table_path, Dataset, DatasetError};
use crate::schema::AliasTable;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

/// Where the performance table lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub path: PathBuf,
    pub sheet: Option<String>,
}

impl DataSource {
    pub fn new(path: impl Into<PathBuf>, sheet: Option<String>) -> Self {
        DataSource {
            path: path.into(),
            sheet,
        }
    }
}

/// Identifies one version of the source: the resolved table path plus its
/// modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadKey {
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

impl ReloadKey {
    fn for_source(source: &DataSource) -> Result<Self, DatasetError> {
        let path = resolve_table_path(&source.path, source.sheet.as_deref())?;
        let metadata = std::fs::metadata(&path).map_err(|e| DatasetError::Io {
            path: path.clone(),
            source: e,
        })?;
        Ok(ReloadKey {
            path,
            modified: metadata.modified().ok(),
        })
    }

    /// Modification time for display.
    pub fn modified_utc(&self) -> Option<DateTime<Utc>> {
        self.modified.map(DateTime::<Utc>::from)
    }
}

/// One immutable load of the source.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub dataset: Arc<Dataset>,
    pub key: ReloadKey,
    pub loaded_at: DateTime<Utc>,
}

/// Outcome of [`SnapshotCache::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// First successful load.
    Loaded,
    /// The source changed and was read again.
    Reloaded,
    /// The source has not changed since the current snapshot.
    Unchanged,
}

/// Holds the latest snapshot and reloads only when the reload key changes.
#[derive(Debug)]
pub struct SnapshotCache {
    source: DataSource,
    aliases: AliasTable,
    current: Option<Snapshot>,
}

impl SnapshotCache {
    pub fn new(source: DataSource, aliases: AliasTable) -> Self {
        SnapshotCache {
            source,
            aliases,
            current: None,
        }
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    /// The current dataset, shared read-only.
    pub fn current(&self) -> Option<Arc<Dataset>> {
        self.current.as_ref().map(|s| Arc::clone(&s.dataset))
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    /// Load the source if it is new or changed.
    ///
    /// On error the previous snapshot stays in place. A source whose
    /// modification time cannot be read is reloaded on every call.
    pub fn refresh(&mut self) -> Result<Refresh, DatasetError> {
        let key = ReloadKey::for_source(&self.source)?;
        if let Some(current) = &self.current {
            if current.key == key && key.modified.is_some() {
                debug!("{} unchanged", key.path.display());
                return Ok(Refresh::Unchanged);
            }
        }

        let dataset = load_dataset(&self.source.path, self.source.sheet.as_deref(), &self.aliases)?;
        let outcome = if self.current.is_some() {
            Refresh::Reloaded
        } else {
            Refresh::Loaded
        };
        info!(
            "{} snapshot of {} ({} records, modified {})",
            if outcome == Refresh::Loaded { "loaded" } else { "reloaded" },
            key.path.display(),
            dataset.len(),
            key.modified_utc()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".into())
        );
        self.current = Some(Snapshot {
            dataset: Arc::new(dataset),
            key,
            loaded_at: Utc::now(),
        });
        Ok(outcome)
    }
}
