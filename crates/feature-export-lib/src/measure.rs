//! Geodesic measurements attached to features before export
//!
//! Areal features receive `area_m2` and linear features `longitud_m`, both as
//! strings with two decimals. Points and other geometry types are left as they are.

use crate::{ExportError, NAME_PROPERTY, Result, STORE_ID_PROPERTY};
use geo::{ChamberlainDuquetteArea, Coord, Haversine, Length, LineString, Polygon};
use geojson::{Feature, FeatureCollection, JsonObject, JsonValue, PointType, Value};

/// Property holding the area in square meters
pub const AREA_PROPERTY: &str = "area_m2";

/// Property holding the length in meters
pub const LENGTH_PROPERTY: &str = "longitud_m";

/// Return a copy of the collection with measurements attached
///
/// The input is left untouched. A geometry that cannot be measured aborts the
/// whole enrichment.
pub fn enrich_features(collection: &FeatureCollection) -> Result<FeatureCollection> {
    #[cfg(feature = "profiling")]
    profiling::scope!("measure::enrich_features");

    let features = collection
        .features
        .iter()
        .map(enrich_feature)
        .collect::<Result<Vec<_>>>()?;

    Ok(FeatureCollection {
        bbox: collection.bbox.clone(),
        features,
        foreign_members: collection.foreign_members.clone(),
    })
}

fn enrich_feature(feature: &Feature) -> Result<Feature> {
    let mut enriched = feature.clone();
    let Some(geometry) = &feature.geometry else {
        return Ok(enriched);
    };

    let measurement = match &geometry.value {
        Value::Polygon(rings) => Some((AREA_PROPERTY, polygon_area(rings))),
        Value::MultiPolygon(polygons) => Some((
            AREA_PROPERTY,
            polygons
                .iter()
                .map(|rings| polygon_area(rings))
                .sum::<std::result::Result<f64, String>>(),
        )),
        Value::LineString(positions) => Some((LENGTH_PROPERTY, line_length(positions))),
        Value::MultiLineString(lines) => Some((
            LENGTH_PROPERTY,
            lines
                .iter()
                .map(|positions| line_length(positions))
                .sum::<std::result::Result<f64, String>>(),
        )),
        _ => None,
    };

    if let Some((key, value)) = measurement {
        let value = value.map_err(|reason| ExportError::Measurement {
            feature: feature_label(feature),
            reason,
        })?;
        enriched
            .properties
            .get_or_insert_with(JsonObject::new)
            .insert(key.to_string(), JsonValue::from(format!("{value:.2}")));
    }

    Ok(enriched)
}

/// Name used to identify a feature in diagnostics
pub(crate) fn feature_label(feature: &Feature) -> String {
    let property = |key: &str| {
        feature
            .properties
            .as_ref()
            .and_then(|properties| properties.get(key))
            .and_then(JsonValue::as_str)
            .map(str::to_string)
    };
    property(NAME_PROPERTY)
        .or_else(|| property(STORE_ID_PROPERTY))
        .unwrap_or_else(|| "<unnamed>".to_string())
}

fn to_coord(position: &PointType) -> std::result::Result<Coord<f64>, String> {
    match position.as_slice() {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => Err(format!(
            "position has {} components, expected at least 2",
            position.len()
        )),
    }
}

fn to_line_string(positions: &[PointType]) -> std::result::Result<LineString<f64>, String> {
    positions
        .iter()
        .map(to_coord)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(LineString::new)
}

/// Spherical area of a polygon (outer ring minus holes) in square meters
///
/// A polygon without rings, or an outer ring with fewer than three positions,
/// has zero area. Degenerate holes are ignored.
fn polygon_area(rings: &[Vec<PointType>]) -> std::result::Result<f64, String> {
    let Some((exterior, interiors)) = rings.split_first() else {
        return Ok(0.0);
    };
    if exterior.len() < 3 {
        return Ok(0.0);
    }

    let polygon = Polygon::new(
        to_line_string(exterior)?,
        interiors
            .iter()
            .filter(|ring| ring.len() >= 3)
            .map(|ring| to_line_string(ring))
            .collect::<std::result::Result<Vec<_>, _>>()?,
    );

    Ok(polygon.chamberlain_duquette_unsigned_area())
}

/// Haversine length of a line in meters
fn line_length(positions: &[PointType]) -> std::result::Result<f64, String> {
    Ok(Haversine.length(&to_line_string(positions)?))
}
