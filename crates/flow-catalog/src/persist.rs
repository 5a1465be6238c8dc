//! Manifest persistence under the project's hidden state directory.

use crate::catalog::FlowCatalog;
use crate::{MANIFEST_FILE, STATE_DIR};
use chrono::Utc;
use questline_core_types::FlowManifest;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot {operation} manifest at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest at {path} is not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest version {found} is newer than supported version {supported}")]
    VersionMismatch { found: u32, supported: u32 },
}

fn manifest_path(project_root: &Path) -> PathBuf {
    project_root.join(STATE_DIR).join(MANIFEST_FILE)
}

impl FlowCatalog {
    /// Persist current flows plus discovery metadata as pretty-printed JSON.
    pub fn save_manifest(
        &self,
        project_root: &Path,
        mut manifest: FlowManifest,
    ) -> Result<PathBuf, CatalogError> {
        manifest.flows = self.all(None);
        let path = manifest_path(project_root);

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| CatalogError::Io {
                operation: "create state dir for",
                path: path.clone(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(&manifest).expect("manifest serializes");
        std::fs::write(&path, json).map_err(|source| CatalogError::Io {
            operation: "write",
            path: path.clone(),
            source,
        })?;

        info!(target: "flow-catalog", path = %path.display(), flows = manifest.flows.len(), "manifest saved");
        Ok(path)
    }

    /// Load a previously saved manifest into the catalog.
    ///
    /// The manifest's scan age carries over: a manifest written six minutes
    /// ago loads as already stale under the default TTL.
    pub fn load_manifest(&self, project_root: &Path) -> Result<FlowManifest, CatalogError> {
        let path = manifest_path(project_root);
        let raw = std::fs::read_to_string(&path).map_err(|source| CatalogError::Io {
            operation: "read",
            path: path.clone(),
            source,
        })?;

        let manifest: FlowManifest =
            serde_json::from_str(&raw).map_err(|source| CatalogError::Malformed {
                path: path.clone(),
                source,
            })?;

        if manifest.version > FlowManifest::CURRENT_VERSION {
            return Err(CatalogError::VersionMismatch {
                found: manifest.version,
                supported: FlowManifest::CURRENT_VERSION,
            });
        }

        self.put_all(manifest.flows.clone());
        let age = (Utc::now() - manifest.scanned_at)
            .to_std()
            .unwrap_or_default();
        self.set_refreshed_ago(age);

        info!(target: "flow-catalog", path = %path.display(), flows = manifest.flows.len(), "manifest loaded");
        Ok(manifest)
    }

    /// Whether a manifest exists for this project.
    pub fn manifest_exists(project_root: &Path) -> bool {
        manifest_path(project_root).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questline_core_types::{Flow, FlowCategory, Step, StepAction};
    use std::time::Duration;

    fn sample_flow() -> Flow {
        Flow::new("login", "Login", FlowCategory::Auth).with_step(Step::new(
            "s1",
            StepAction::Navigate {
                url: "/login".to_string(),
            },
        ))
    }

    #[test]
    fn manifest_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FlowCatalog::new();
        catalog.put(sample_flow());

        catalog
            .save_manifest(dir.path(), FlowManifest::new(Vec::new()))
            .unwrap();
        assert!(FlowCatalog::manifest_exists(dir.path()));

        let fresh = FlowCatalog::new();
        let manifest = fresh.load_manifest(dir.path()).unwrap();
        assert_eq!(manifest.flows.len(), 1);
        assert_eq!(fresh.get("login").unwrap().name, "Login");
        assert!(!fresh.is_stale(Duration::from_secs(60)));
    }

    #[test]
    fn missing_manifest_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FlowCatalog::new();
        assert!(matches!(
            catalog.load_manifest(dir.path()),
            Err(CatalogError::Io { .. })
        ));
    }

    #[test]
    fn corrupt_manifest_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join(STATE_DIR);
        std::fs::create_dir_all(&state).unwrap();
        std::fs::write(state.join(MANIFEST_FILE), "{not json").unwrap();

        let catalog = FlowCatalog::new();
        assert!(matches!(
            catalog.load_manifest(dir.path()),
            Err(CatalogError::Malformed { .. })
        ));
    }

    #[test]
    fn stale_manifest_loads_as_stale() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FlowCatalog::new();
        catalog.put(sample_flow());

        let mut manifest = FlowManifest::new(Vec::new());
        manifest.scanned_at = Utc::now() - chrono::Duration::seconds(600);
        catalog.save_manifest(dir.path(), manifest).unwrap();

        let fresh = FlowCatalog::new();
        fresh.load_manifest(dir.path()).unwrap();
        assert!(fresh.is_stale(crate::DEFAULT_TTL));
    }
}
