//! Feature Export Library - Geometry Enrichment and Interchange Serialization
//!
//! This library turns the vector features stored for a project into downloadable
//! interchange files. Each export fetches the raw records from a feature store,
//! enriches every feature with geodesic measurements and serializes the result
//! as GeoJSON, KML, or a per-vertex CSV table with UTM coordinates.
//!
//! # Architecture
//!
//! - **[`Projector`]**: WGS84 to UTM conversion backed by an idempotent [`ZoneRegistry`]
//! - **[`enrich_features`]**: Attaches `area_m2` / `longitud_m` to areal and linear features
//! - **[`flatten_features`]**: Expands features into one [`FlattenedRow`] per vertex
//! - **[`format`]**: GeoJSON, KML and CSV encoders
//! - **[`Exporter`]**: Fetch, enrich, flatten, serialize and deliver
//!
//! # Pipeline
//!
//! ```text
//! FeatureStore --> enrich --> (flatten, CSV only) --> serialize --> DeliverySink
//! ```
//!
//! Only the fetch stage suspends; everything after it is synchronous.

mod delivery;
mod export;
mod flatten;
pub mod format;
mod measure;
mod store;
pub mod utm;

// Public API exports
pub use delivery::{DeliveryError, DeliveryResult, DeliverySink, MemorySink};
pub use export::{
    Artifact, Config, ExportFormat, ExportOutcome, ExportSummary, Exporter, FAILURE_NOTICE,
};
pub use flatten::{
    ELEVATION_PLACEHOLDER, FlattenState, FlattenedRow, ROW_FIELDS, flatten_feature, flatten_features,
    geometry_label,
};
pub use measure::{AREA_PROPERTY, LENGTH_PROPERTY, enrich_features};
pub use store::{
    FeatureStore, MemoryStore, NAME_PROPERTY, STORE_ID_PROPERTY, StoreError, StoreResult,
    StoredRecord, load_collection,
};
pub use utm::{Hemisphere, ProjectionError, Projector, UtmCoordinate, ZoneRegistry};

/// Error types for a single export attempt
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Feature store error: {0}")]
    Store(#[from] StoreError),

    #[error("Measurement failed for feature '{feature}': {reason}")]
    Measurement { feature: String, reason: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ExportError>;
