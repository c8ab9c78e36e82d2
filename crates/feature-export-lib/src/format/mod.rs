//! Encoders for the supported interchange formats
//!
//! - [`geojson`]: pretty-printed GeoJSON of the enriched collection
//! - [`kml`]: one KML placemark per feature
//! - [`csv`]: header plus one line per record, quoting only when needed

pub mod csv;
pub mod geojson;
pub mod kml;

pub use self::csv::{CsvRecord, NumberedRow, ROW_NUMBER_FIELD, number_rows, to_csv};
pub use self::geojson::to_geojson;
pub use self::kml::{KML_NAMESPACE, PlacemarkError, to_kml};

/// GeoJSON type name of a geometry value
pub fn geometry_type_name(value: &::geojson::Value) -> &'static str {
    use ::geojson::Value;

    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}
