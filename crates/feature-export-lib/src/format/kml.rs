//! KML encoding
//!
//! Points, lines and the outer ring of polygons are written as KML geometry.
//! Any other feature still gets a placemark, holding only its name.

use crate::NAME_PROPERTY;
use ::geojson::{Feature, FeatureCollection, PointType, Value};

/// OGC KML 2.2 namespace
pub const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";

/// Reasons a single feature could not be converted to KML geometry
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlacemarkError {
    #[error("position has {0} components, expected at least 2")]
    ShortPosition(usize),

    #[error("polygon has no outer ring")]
    MissingOuterRing,
}

/// Serialize the collection as a KML document
///
/// Conversion failures are logged with the feature name and leave that
/// placemark without geometry.
pub fn to_kml(collection: &FeatureCollection, unnamed_label: &str) -> String {
    #[cfg(feature = "profiling")]
    profiling::scope!("kml::to_kml");

    let mut kml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<kml xmlns=\"{KML_NAMESPACE}\">\n  <Document>\n"
    );

    for feature in &collection.features {
        kml.push_str(&placemark(feature, unnamed_label));
        kml.push('\n');
    }

    kml.push_str("  </Document>\n</kml>");
    kml
}

fn placemark(feature: &Feature, unnamed_label: &str) -> String {
    let name = feature
        .properties
        .as_ref()
        .and_then(|properties| properties.get(NAME_PROPERTY))
        .and_then(|name| name.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(unnamed_label);

    let body = match feature.geometry.as_ref().map(|g| placemark_body(&g.value)) {
        Some(Ok(body)) => body,
        Some(Err(err)) => {
            tracing::error!("Error converting feature {name} to KML: {err}");
            None
        }
        None => None,
    };

    let mut placemark = format!("    <Placemark>\n      <name>{}</name>\n", escape_xml(name));
    if let Some(body) = body {
        placemark.push_str("      ");
        placemark.push_str(&body);
        placemark.push('\n');
    }
    placemark.push_str("    </Placemark>");
    placemark
}

/// KML geometry element for a geometry, `None` when the type is not exported
pub fn placemark_body(value: &Value) -> Result<Option<String>, PlacemarkError> {
    let body = match value {
        Value::Point(position) => {
            format!("<Point><coordinates>{}</coordinates></Point>", coordinate(position)?)
        }
        Value::LineString(positions) => format!(
            "<LineString><coordinates>{}</coordinates></LineString>",
            coordinates(positions)?
        ),
        Value::Polygon(rings) => {
            let outer = rings.first().ok_or(PlacemarkError::MissingOuterRing)?;
            format!(
                "<Polygon><outerBoundaryIs><LinearRing><coordinates>{}</coordinates></LinearRing></outerBoundaryIs></Polygon>",
                coordinates(outer)?
            )
        }
        _ => return Ok(None),
    };
    Ok(Some(body))
}

/// `lon,lat,0` triple
fn coordinate(position: &PointType) -> Result<String, PlacemarkError> {
    match position.as_slice() {
        [lon, lat, ..] => Ok(format!("{lon},{lat},0")),
        _ => Err(PlacemarkError::ShortPosition(position.len())),
    }
}

fn coordinates(positions: &[PointType]) -> Result<String, PlacemarkError> {
    Ok(positions
        .iter()
        .map(coordinate)
        .collect::<Result<Vec<_>, _>>()?
        .join(" "))
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
