//! Directory-backed feature store and delivery sink.
//!
//! A project is read from either layout below `root`:
//!
//! - `<project_id>/features/<record_id>.json`, one file per feature holding
//!   `{ "name": ..., "geometry": "<GeoJSON string>" }`, ordered by record id.
//! - `<project_id>.json`, a single array of `{ "id", "name", "geometry" }` records
//!   kept in file order.
//!
//! Exports are written to `<out_dir>/<file_name>`.

use feature_export_lib::{
    DeliveryError, DeliveryResult, DeliverySink, FeatureStore, StoreError, StoreResult,
    StoredRecord,
};
use serde::Deserialize;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Contents of a single per-feature record file
#[derive(Debug, Deserialize)]
struct RecordFile {
    #[serde(default)]
    name: Option<String>,
    geometry: String,
}

/// Reads projects from a directory tree
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    async fn read_feature_dir(&self, dir: &Path) -> StoreResult<Vec<StoredRecord>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let id = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string)
                .ok_or_else(|| StoreError::Backend(format!("bad file name: {}", path.display())))?;

            let text = tokio::fs::read_to_string(&path).await?;
            let file: RecordFile =
                serde_json::from_str(&text).map_err(|e| StoreError::InvalidRecord {
                    id: id.clone(),
                    reason: e.to_string(),
                })?;

            records.push(StoredRecord {
                id,
                name: file.name,
                geometry: file.geometry,
            });
        }
        Ok(records)
    }

    async fn read_dump(&self, path: &Path, project_id: &str) -> StoreResult<Vec<StoredRecord>> {
        let text = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&text).map_err(|e| StoreError::InvalidRecord {
            id: project_id.to_string(),
            reason: e.to_string(),
        })
    }
}

fn is_valid_project_id(project_id: &str) -> bool {
    !project_id.is_empty()
        && project_id != "."
        && project_id != ".."
        && !project_id.contains(['/', '\\'])
}

impl FeatureStore for DirectoryStore {
    async fn fetch_records(&self, project_id: &str) -> StoreResult<Vec<StoredRecord>> {
        if !is_valid_project_id(project_id) {
            return Err(StoreError::Backend(format!(
                "invalid project id: {project_id:?}"
            )));
        }

        let feature_dir = self.root.join(project_id).join("features");
        if tokio::fs::metadata(&feature_dir).await.is_ok_and(|m| m.is_dir()) {
            return self.read_feature_dir(&feature_dir).await;
        }

        let dump = self.root.join(format!("{project_id}.json"));
        match self.read_dump(&dump, project_id).await {
            Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::ProjectNotFound(project_id.to_string()))
            }
            result => result,
        }
    }
}

/// Writes exports into a directory, creating it on first use
#[derive(Debug, Clone)]
pub struct DirectorySink {
    out_dir: PathBuf,
}

impl DirectorySink {
    pub fn new(out_dir: impl AsRef<Path>) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
        }
    }
}

impl DeliverySink for DirectorySink {
    fn deliver(&self, content: &str, file_name: &str, mime_type: &str) -> DeliveryResult<()> {
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(DeliveryError::Rejected {
                file_name: file_name.to_string(),
                reason: "file name must not contain path separators".to_string(),
            });
        }

        std::fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(file_name);

        // Stage next to the target so the final rename never exposes a partial file
        let mut staged = NamedTempFile::new_in(&self.out_dir)?;
        staged.write_all(content.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(&path).map_err(|err| err.error)?;
        tracing::info!("Wrote {} ({mime_type})", path.display());
        Ok(())
    }

    fn notify_failure(&self, message: &str) {
        tracing::error!("{message}");
        eprintln!("{message}");
    }
}
