//! Feature store abstraction
//!
//! A store yields the raw records saved for a project. Each record carries a
//! GeoJSON string (a `Feature` or a bare `Geometry`), a display name and the
//! identifier the store assigned to it. [`load_collection`] turns those records
//! into a [`FeatureCollection`], keeping the store's order.

use dashmap::DashMap;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use std::future::Future;

/// Property holding the store-assigned record identifier
pub const STORE_ID_PROPERTY: &str = "store_id";

/// Property holding the display name
pub const NAME_PROPERTY: &str = "name";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Record {id} is not valid GeoJSON: {source}")]
    InvalidGeometry {
        id: String,
        #[source]
        source: geojson::Error,
    },

    #[error("Record {id} holds a FeatureCollection, expected a Feature or Geometry")]
    UnexpectedCollection { id: String },

    #[error("Record {id} has no geometry")]
    MissingGeometry { id: String },

    #[error("Record {id} is malformed: {reason}")]
    InvalidRecord { id: String, reason: String },

    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A feature as persisted by the store
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoredRecord {
    /// Identifier assigned by the store
    pub id: String,
    /// Display name, if the user gave one
    pub name: Option<String>,
    /// Serialized GeoJSON `Feature` or `Geometry`
    pub geometry: String,
}

impl StoredRecord {
    pub fn new(id: impl Into<String>, name: Option<&str>, geometry: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.map(str::to_string),
            geometry: geometry.into(),
        }
    }

    /// Parse the geometry string and attach the id and name as properties
    pub fn into_feature(self) -> StoreResult<Feature> {
        let parsed = self
            .geometry
            .parse::<GeoJson>()
            .map_err(|source| StoreError::InvalidGeometry {
                id: self.id.clone(),
                source,
            })?;

        let mut feature = match parsed {
            GeoJson::Feature(feature) => feature,
            GeoJson::Geometry(geometry) => Feature {
                bbox: None,
                geometry: Some(geometry),
                id: None,
                properties: None,
                foreign_members: None,
            },
            GeoJson::FeatureCollection(_) => {
                return Err(StoreError::UnexpectedCollection { id: self.id });
            }
        };

        if feature.geometry.is_none() {
            return Err(StoreError::MissingGeometry { id: self.id });
        }

        let properties = feature.properties.get_or_insert_with(JsonObject::new);
        properties.insert(STORE_ID_PROPERTY.to_string(), JsonValue::from(self.id));
        if let Some(name) = self.name {
            properties.insert(NAME_PROPERTY.to_string(), JsonValue::from(name));
        }

        Ok(feature)
    }
}

/// Source of stored feature records.
///
/// Fetching is the only asynchronous step of an export. Implementations either
/// return every record of the project or fail as a whole.
pub trait FeatureStore: Send + Sync {
    fn fetch_records(
        &self,
        project_id: &str,
    ) -> impl Future<Output = StoreResult<Vec<StoredRecord>>> + Send;
}

/// Fetch a project's records and assemble them into a collection
pub async fn load_collection<S: FeatureStore>(
    store: &S,
    project_id: &str,
) -> StoreResult<FeatureCollection> {
    let records = store.fetch_records(project_id).await?;
    tracing::debug!(
        "Fetched {} records for project {project_id}",
        records.len()
    );

    let features = records
        .into_iter()
        .map(StoredRecord::into_feature)
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// In-process store keyed by project id.
///
/// Unknown projects have no records.
#[derive(Debug, Default)]
pub struct MemoryStore {
    projects: DashMap<String, Vec<StoredRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all records of a project
    pub fn insert(&self, project_id: impl Into<String>, records: Vec<StoredRecord>) {
        self.projects.insert(project_id.into(), records);
    }

    /// Append a record to a project
    pub fn push(&self, project_id: impl Into<String>, record: StoredRecord) {
        self.projects
            .entry(project_id.into())
            .or_default()
            .push(record);
    }
}

impl FeatureStore for MemoryStore {
    async fn fetch_records(&self, project_id: &str) -> StoreResult<Vec<StoredRecord>> {
        Ok(self
            .projects
            .get(project_id)
            .map(|records| records.value().clone())
            .unwrap_or_default())
    }
}
