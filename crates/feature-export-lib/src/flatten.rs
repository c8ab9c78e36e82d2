//! Per-vertex flattening of features for tabular export
//!
//! Every vertex of a point, line or outer polygon ring becomes one
//! [`FlattenedRow`] carrying its geographic and UTM coordinates. Polygon holes
//! and multi-part geometries do not produce rows.

use crate::format::csv::CsvRecord;
use crate::utm::{ProjectionError, Projector, UtmCoordinate};
use crate::{NAME_PROPERTY, format::geometry_type_name};
use geojson::{Feature, FeatureCollection, PointType, Value};

/// Column names of a flattened row, in output order
pub const ROW_FIELDS: [&str; 9] = [
    "Nombre Forma",
    "Tipo Geometría",
    "Vértice/Punto Nº",
    "Latitud",
    "Longitud",
    "UTMX",
    "UTMY",
    "Zona UTM",
    "Elevacion (m)",
];

/// Elevation is not sourced; every row carries this value
pub const ELEVATION_PLACEHOLDER: f64 = 0.0;

/// One output row per exported vertex
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedRow {
    /// Display name, or the configured placeholder
    pub name: String,
    /// Translated geometry type
    pub geometry_label: String,
    /// 1-based vertex index, or the running point number for points
    pub vertex: usize,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// UTM coordinate, or why it could not be computed
    pub projection: Result<UtmCoordinate, ProjectionError>,
    pub elevation: f64,
}

impl FlattenedRow {
    /// UTMX, UTMY and zone cells, degraded to the error sentinel on failure
    pub fn projection_cells(&self) -> [String; 3] {
        match &self.projection {
            Ok(coord) => [
                coord.easting_label(),
                coord.northing_label(),
                coord.zone_label(),
            ],
            Err(err) => {
                let sentinel = err.sentinel().to_string();
                [sentinel.clone(), sentinel.clone(), sentinel]
            }
        }
    }
}

impl CsvRecord for FlattenedRow {
    fn field_names(&self) -> Vec<String> {
        ROW_FIELDS.iter().map(|name| name.to_string()).collect()
    }

    fn field_values(&self) -> Vec<String> {
        // Plain decimal notation, never exponent form
        let coordinate = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();
        let [x, y, zone] = self.projection_cells();
        vec![
            self.name.clone(),
            self.geometry_label.clone(),
            self.vertex.to_string(),
            coordinate(self.latitude),
            coordinate(self.longitude),
            x,
            y,
            zone,
            self.elevation.to_string(),
        ]
    }
}

/// Accumulator threaded through flattening of one collection
#[derive(Debug, Clone, Default)]
pub struct FlattenState {
    /// Number of point features seen so far
    points_seen: usize,
}

impl FlattenState {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn points_seen(&self) -> usize {
        self.points_seen
    }
}

/// Display label for a geometry type
pub fn geometry_label(value: &Value) -> &'static str {
    match value {
        Value::Polygon(_) => "Polígono",
        Value::LineString(_) => "Línea",
        Value::Point(_) => "Punto",
        other => geometry_type_name(other),
    }
}

/// Flatten a whole collection, numbering points across all of its features
pub fn flatten_features(
    collection: &FeatureCollection,
    projector: &Projector,
    unnamed_label: &str,
) -> Vec<FlattenedRow> {
    #[cfg(feature = "profiling")]
    profiling::scope!("flatten::flatten_features");

    let mut state = FlattenState::new();
    collection
        .features
        .iter()
        .flat_map(|feature| flatten_feature(feature, projector, unnamed_label, &mut state))
        .collect()
}

/// Flatten a single feature, advancing the point counter in `state`
pub fn flatten_feature(
    feature: &Feature,
    projector: &Projector,
    unnamed_label: &str,
    state: &mut FlattenState,
) -> Vec<FlattenedRow> {
    let Some(geometry) = &feature.geometry else {
        return Vec::new();
    };
    let value = &geometry.value;

    let is_point = matches!(value, Value::Point(_));
    if is_point {
        state.points_seen += 1;
    }

    let positions: &[PointType] = match value {
        Value::Point(position) => std::slice::from_ref(position),
        Value::LineString(positions) => positions,
        Value::Polygon(rings) => rings.first().map(Vec::as_slice).unwrap_or_default(),
        _ => &[],
    };

    let name = feature
        .properties
        .as_ref()
        .and_then(|properties| properties.get(NAME_PROPERTY))
        .and_then(|name| name.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(unnamed_label);
    let label = geometry_label(value);

    positions
        .iter()
        .enumerate()
        .map(|(index, position)| {
            let longitude = position.first().copied();
            let latitude = position.get(1).copied();
            let projection = projector.project(
                latitude.unwrap_or(f64::NAN),
                longitude.unwrap_or(f64::NAN),
            );
            FlattenedRow {
                name: name.to_string(),
                geometry_label: label.to_string(),
                vertex: if is_point { state.points_seen } else { index + 1 },
                latitude,
                longitude,
                projection,
                elevation: ELEVATION_PLACEHOLDER,
            }
        })
        .collect()
}
