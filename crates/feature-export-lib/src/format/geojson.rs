//! GeoJSON encoding

use crate::Result;
use ::geojson::FeatureCollection;

/// Serialize the collection as GeoJSON indented with two spaces
pub fn to_geojson(collection: &FeatureCollection) -> Result<String> {
    Ok(serde_json::to_string_pretty(collection)?)
}
