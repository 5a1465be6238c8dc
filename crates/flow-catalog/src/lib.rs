//! Flow catalog: mutex-guarded in-memory store plus an optional on-disk JSON
//! manifest for cross-invocation persistence.
//!
//! Discovery (scanning + AI interpretation) happens elsewhere; the catalog
//! only stores and serves results. The catalog is sole owner of its flows -
//! readers get cloned snapshots, so an in-flight executor run is never
//! affected by a concurrent invalidation.

mod catalog;
mod persist;

pub use catalog::{FlowCatalog, DEFAULT_TTL};
pub use persist::CatalogError;

/// Project-relative hidden directory holding the manifest and run artifacts.
pub const STATE_DIR: &str = ".questline";

/// Manifest file name inside [`STATE_DIR`].
pub const MANIFEST_FILE: &str = "flows.json";
