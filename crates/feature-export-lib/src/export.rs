//! Export orchestration
//!
//! An export runs four stages in order: fetch the project's records, enrich
//! them with measurements, flatten them to vertex rows (CSV only), then
//! serialize and hand the file to the delivery sink. Any stage failure is
//! caught here, logged, and reported once through the sink; nothing partial
//! is delivered.

use crate::format::{number_rows, to_csv, to_geojson, to_kml};
use crate::{
    DeliverySink, ExportError, FeatureStore, Projector, Result, enrich_features,
    flatten_features, load_collection,
};
use geojson::FeatureCollection;
use std::fmt;
use std::str::FromStr;

/// Message shown to the user when an export fails
pub const FAILURE_NOTICE: &str =
    "The export could not be completed. Check the log for details.";

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum ExportFormat {
    GeoJson,
    Kml,
    Csv,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::GeoJson, ExportFormat::Kml, ExportFormat::Csv];

    /// File extension, also the name accepted by [`FromStr`]
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::GeoJson => "geojson",
            ExportFormat::Kml => "kml",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::GeoJson => "application/json",
            ExportFormat::Kml => "application/vnd.google-earth.kml+xml",
            ExportFormat::Csv => "text/csv;charset=utf-8;",
        }
    }
}

/// Only the exact lowercase extension is accepted; `"CSV"` or `" kml "` are unsupported.
impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        ExportFormat::ALL
            .into_iter()
            .find(|format| format.extension() == s)
            .ok_or_else(|| ExportError::UnsupportedFormat(s.to_string()))
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Configuration for the exporter
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// File name stem used when no project name is given.
    /// Default: `export`
    pub default_file_stem: String,
    /// Name written for features without one.
    /// Default: `Sin nombre`
    pub unnamed_label: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_file_stem: "export".to_string(),
            unnamed_label: "Sin nombre".to_string(),
        }
    }
}

/// A serialized export ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub content: String,
    pub file_name: String,
    pub mime_type: String,
}

/// Information about a delivered export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub file_name: String,
    pub mime_type: String,
    /// Size of the delivered content in bytes
    pub bytes: usize,
    /// Number of features in the project
    pub feature_count: usize,
}

/// Result of one export invocation
#[derive(Debug)]
pub enum ExportOutcome {
    /// The file was handed to the sink
    Delivered(ExportSummary),
    /// Serialization produced no content; nothing was delivered
    Empty,
    /// The requested format is not supported; nothing was attempted
    UnsupportedFormat(String),
    /// A stage failed; the user was notified and nothing was delivered
    Failed(ExportError),
}

impl ExportOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ExportOutcome::Delivered(_))
    }
}

/// Runs exports from a feature store to a delivery sink
#[derive(Debug)]
pub struct Exporter<S, D> {
    store: S,
    sink: D,
    projector: Projector,
    config: Config,
}

impl<S: FeatureStore, D: DeliverySink> Exporter<S, D> {
    /// Create an exporter with its own zone registry
    pub fn new(store: S, sink: D, config: Config) -> Self {
        Self {
            store,
            sink,
            projector: Projector::default(),
            config,
        }
    }

    /// Use the given projector, e.g. to share a zone registry between exporters
    pub fn with_projector(mut self, projector: Projector) -> Self {
        self.projector = projector;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Export a project in the requested format
    ///
    /// Never fails: unsupported formats are logged and skipped, stage failures are
    /// logged and reported through [`DeliverySink::notify_failure`].
    pub async fn export_project(
        &self,
        project_id: &str,
        format: &str,
        project_name: Option<&str>,
    ) -> ExportOutcome {
        tracing::info!("Starting export of project {project_id} as {format}");

        let format = match format.parse::<ExportFormat>() {
            Ok(format) => format,
            Err(err) => {
                tracing::error!("{err}");
                return ExportOutcome::UnsupportedFormat(format.to_string());
            }
        };

        let file_stem = project_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.config.default_file_stem);

        match self.run(project_id, format, file_stem).await {
            Ok(Some(summary)) => {
                tracing::info!(
                    "Export completed: {} ({} bytes, {} features)",
                    summary.file_name,
                    summary.bytes,
                    summary.feature_count
                );
                ExportOutcome::Delivered(summary)
            }
            Ok(None) => {
                tracing::info!("Export of project {project_id} produced no content");
                ExportOutcome::Empty
            }
            Err(err) => {
                tracing::error!("Export of project {project_id} failed: {err}");
                self.sink.notify_failure(FAILURE_NOTICE);
                ExportOutcome::Failed(err)
            }
        }
    }

    async fn run(
        &self,
        project_id: &str,
        format: ExportFormat,
        file_stem: &str,
    ) -> Result<Option<ExportSummary>> {
        let collection = load_collection(&self.store, project_id).await?;

        let Some(artifact) = self.render(&collection, format, file_stem)? else {
            return Ok(None);
        };

        self.sink
            .deliver(&artifact.content, &artifact.file_name, &artifact.mime_type)?;

        Ok(Some(ExportSummary {
            bytes: artifact.content.len(),
            file_name: artifact.file_name,
            mime_type: artifact.mime_type,
            feature_count: collection.features.len(),
        }))
    }

    /// Enrich and serialize an already fetched collection
    ///
    /// Returns `None` when the serialized content is empty.
    pub fn render(
        &self,
        collection: &FeatureCollection,
        format: ExportFormat,
        file_stem: &str,
    ) -> Result<Option<Artifact>> {
        let enriched = enrich_features(collection)?;
        tracing::debug!("Enriched {} features", enriched.features.len());

        let content = match format {
            ExportFormat::GeoJson => to_geojson(&enriched)?,
            ExportFormat::Kml => to_kml(&enriched, &self.config.unnamed_label),
            ExportFormat::Csv => {
                let rows = flatten_features(&enriched, &self.projector, &self.config.unnamed_label);
                tracing::debug!("Flattened into {} rows", rows.len());
                to_csv(&number_rows(&rows))?
            }
        };

        if content.is_empty() {
            return Ok(None);
        }

        Ok(Some(Artifact {
            content,
            file_name: format!("{file_stem}.{}", format.extension()),
            mime_type: format.mime_type().to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AREA_PROPERTY, DeliveryError, DeliveryResult, LENGTH_PROPERTY, MemorySink, MemoryStore,
        StoreError, StoreResult, StoredRecord,
    };
    use geojson::{Feature, Geometry, Value};

    const PROJECT: &str = "project-1";

    fn point(id: &str, name: &str, lon: f64, lat: f64) -> StoredRecord {
        StoredRecord::new(
            id,
            Some(name),
            format!(
                r#"{{"type":"Feature","geometry":{{"type":"Point","coordinates":[{lon},{lat}]}},"properties":{{}}}}"#
            ),
        )
    }

    fn line(id: &str, name: &str, coordinates: &str) -> StoredRecord {
        StoredRecord::new(
            id,
            Some(name),
            format!(r#"{{"type":"LineString","coordinates":{coordinates}}}"#),
        )
    }

    fn exporter(records: Vec<StoredRecord>) -> Exporter<MemoryStore, MemorySink> {
        let store = MemoryStore::new();
        store.insert(PROJECT, records);
        Exporter::new(store, MemorySink::new(), Config::default())
    }

    struct FailingStore;

    impl FeatureStore for FailingStore {
        async fn fetch_records(&self, _project_id: &str) -> StoreResult<Vec<StoredRecord>> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
    }

    #[derive(Default)]
    struct RejectingSink {
        inner: MemorySink,
    }

    impl DeliverySink for RejectingSink {
        fn deliver(&self, _content: &str, file_name: &str, _mime_type: &str) -> DeliveryResult<()> {
            Err(DeliveryError::Rejected {
                file_name: file_name.to_string(),
                reason: "disk full".to_string(),
            })
        }

        fn notify_failure(&self, message: &str) {
            self.inner.notify_failure(message);
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("geojson".parse::<ExportFormat>().unwrap(), ExportFormat::GeoJson);
        assert_eq!("kml".parse::<ExportFormat>().unwrap(), ExportFormat::Kml);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("CSV".parse::<ExportFormat>().is_err());
        assert!(" kml ".parse::<ExportFormat>().is_err());
        assert!(matches!(
            "shp".parse::<ExportFormat>(),
            Err(ExportError::UnsupportedFormat(ref f)) if f == "shp"
        ));
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(ExportFormat::GeoJson.mime_type(), "application/json");
        assert_eq!(
            ExportFormat::Kml.mime_type(),
            "application/vnd.google-earth.kml+xml"
        );
        assert_eq!(ExportFormat::Csv.mime_type(), "text/csv;charset=utf-8;");
    }

    #[tokio::test]
    async fn test_single_point_csv() {
        let exporter = exporter(vec![point("a", "P1", -58.5, -34.6)]);

        let outcome = exporter.export_project(PROJECT, "csv", None).await;
        assert!(outcome.is_delivered());

        let deliveries = exporter.sink().deliveries();
        assert_eq!(deliveries.len(), 1);
        let artifact = &deliveries[0];
        assert_eq!(artifact.file_name, "export.csv");
        assert_eq!(artifact.mime_type, "text/csv;charset=utf-8;");

        let lines: Vec<&str> = artifact.content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "num_registro,Nombre Forma,Tipo Geometría,Vértice/Punto Nº,Latitud,Longitud,UTMX,UTMY,Zona UTM,Elevacion (m)"
        );
        assert_eq!(
            lines[1],
            "1,P1,Punto,1,-34.6,-58.5,362454.14,6170291.43,21S,0"
        );
        assert!(!artifact.content.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_csv_row_numbers_are_global() {
        let exporter = exporter(vec![
            line("l1", "Camino, norte", "[[0,0],[0.1,0]]"),
            point("p1", "P1", 0.5, 0.5),
            line("l2", "Camino sur", "[[0,-1],[0.1,-1]]"),
        ]);
        exporter.export_project(PROJECT, "csv", Some("campo")).await;

        let artifact = &exporter.sink().deliveries()[0];
        assert_eq!(artifact.file_name, "campo.csv");
        let rows: Vec<Vec<&str>> = artifact
            .content
            .lines()
            .skip(1)
            .map(|line| line.splitn(3, ',').collect())
            .collect();
        let numbers: Vec<&str> = rows.iter().map(|row| row[0]).collect();
        assert_eq!(numbers, vec!["1", "2", "3", "4", "5"]);
        assert!(artifact.content.contains("\n1,\"Camino, norte\",Línea,1,"));
        assert!(artifact.content.contains("\n3,P1,Punto,1,"));
    }

    #[tokio::test]
    async fn test_geojson_round_trip() {
        let exporter = exporter(vec![
            point("a", "P1", -58.5, -34.6),
            line("b", "L1", "[[0,0],[1,0]]"),
        ]);
        let outcome = exporter
            .export_project(PROJECT, "geojson", Some("Campo Norte"))
            .await;

        let ExportOutcome::Delivered(summary) = outcome else {
            panic!("expected delivery, got {outcome:?}");
        };
        assert_eq!(summary.file_name, "Campo Norte.geojson");
        assert_eq!(summary.mime_type, "application/json");
        assert_eq!(summary.feature_count, 2);

        let artifact = &exporter.sink().deliveries()[0];
        let parsed: FeatureCollection = serde_json::from_str(&artifact.content).unwrap();
        let expected = enrich_features(
            &load_collection(exporter.store(), PROJECT).await.unwrap(),
        )
        .unwrap();
        assert_eq!(parsed, expected);

        let line_properties = parsed.features[1].properties.as_ref().unwrap();
        assert_eq!(line_properties[LENGTH_PROPERTY], "111195.08");
        assert!(!line_properties.contains_key(AREA_PROPERTY));
    }

    #[tokio::test]
    async fn test_kml_export() {
        let exporter = exporter(vec![point("a", "P1", -58.5, -34.6)]);
        exporter.export_project(PROJECT, "kml", None).await;

        let artifact = &exporter.sink().deliveries()[0];
        assert_eq!(artifact.file_name, "export.kml");
        assert_eq!(artifact.mime_type, "application/vnd.google-earth.kml+xml");
        assert!(artifact.content.contains("<coordinates>-58.5,-34.6,0</coordinates>"));
    }

    #[tokio::test]
    async fn test_unsupported_format_is_a_no_op() {
        let exporter = exporter(vec![point("a", "P1", -58.5, -34.6)]);
        let outcome = exporter.export_project(PROJECT, "shp", None).await;

        assert!(matches!(outcome, ExportOutcome::UnsupportedFormat(ref f) if f == "shp"));
        assert!(exporter.sink().deliveries().is_empty());
        assert!(exporter.sink().notices().is_empty());
    }

    #[tokio::test]
    async fn test_format_name_is_case_sensitive() {
        let exporter = exporter(vec![point("a", "P1", -58.5, -34.6)]);
        let outcome = exporter.export_project(PROJECT, "CSV", None).await;

        assert!(matches!(outcome, ExportOutcome::UnsupportedFormat(ref f) if f == "CSV"));
        assert!(exporter.sink().deliveries().is_empty());
    }

    #[tokio::test]
    async fn test_empty_csv_is_not_delivered() {
        let exporter = exporter(vec![]);
        let outcome = exporter.export_project(PROJECT, "csv", None).await;

        assert!(matches!(outcome, ExportOutcome::Empty));
        assert!(exporter.sink().deliveries().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_notifies_once() {
        let exporter = Exporter::new(FailingStore, MemorySink::new(), Config::default());
        let outcome = exporter.export_project(PROJECT, "geojson", None).await;

        assert!(matches!(outcome, ExportOutcome::Failed(ExportError::Store(_))));
        assert!(exporter.sink().deliveries().is_empty());
        assert_eq!(exporter.sink().notices(), vec![FAILURE_NOTICE.to_string()]);
    }

    #[tokio::test]
    async fn test_empty_polygon_does_not_abort_export() {
        let exporter = exporter(vec![
            point("a", "P1", -58.5, -34.6),
            StoredRecord::new("b", Some("Empty"), r#"{"type":"Polygon","coordinates":[]}"#),
        ]);

        let outcome = exporter.export_project(PROJECT, "kml", None).await;
        assert!(outcome.is_delivered());
        let kml = &exporter.sink().deliveries()[0].content;
        assert!(kml.contains("<coordinates>-58.5,-34.6,0</coordinates>"));
        assert!(kml.contains("<name>Empty</name>\n    </Placemark>"));
        assert!(exporter.sink().notices().is_empty());

        exporter.export_project(PROJECT, "geojson", None).await;
        let geojson: FeatureCollection =
            serde_json::from_str(&exporter.sink().deliveries()[1].content).unwrap();
        assert_eq!(
            geojson.features[1].properties.as_ref().unwrap()[AREA_PROPERTY],
            "0.00"
        );
    }

    #[test]
    fn test_measurement_failure_is_fatal() {
        let exporter = exporter(vec![]);
        let broken = FeatureCollection {
            bbox: None,
            features: vec![Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::LineString(vec![
                    vec![0.0, 0.0],
                    vec![1.0],
                ]))),
                id: None,
                properties: None,
                foreign_members: None,
            }],
            foreign_members: None,
        };

        let err = exporter
            .render(&broken, ExportFormat::Kml, "broken")
            .unwrap_err();
        assert!(matches!(err, ExportError::Measurement { .. }));
    }

    #[tokio::test]
    async fn test_delivery_failure_notifies() {
        let store = MemoryStore::new();
        store.insert(PROJECT, vec![point("a", "P1", 1.0, 1.0)]);
        let exporter = Exporter::new(store, RejectingSink::default(), Config::default());

        let outcome = exporter.export_project(PROJECT, "geojson", None).await;
        assert!(matches!(outcome, ExportOutcome::Failed(ExportError::Delivery(_))));
        assert_eq!(exporter.sink().inner.notices().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_exports_are_independent() {
        let exporter = exporter(vec![
            point("a", "P1", 3.0, 40.0),
            point("b", "P2", 3.1, 40.1),
        ]);

        let (first, second) = tokio::join!(
            exporter.export_project(PROJECT, "csv", Some("one")),
            exporter.export_project(PROJECT, "csv", Some("two")),
        );
        assert!(first.is_delivered());
        assert!(second.is_delivered());

        let deliveries = exporter.sink().deliveries();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0].content, deliveries[1].content);
        assert!(deliveries[0].content.contains("\n2,P2,Punto,2,"));
        assert_eq!(exporter.projector().registry().len(), 1);
    }

    #[test]
    fn test_render_without_store() {
        let exporter = exporter(vec![]);
        let empty = FeatureCollection {
            bbox: None,
            features: vec![],
            foreign_members: None,
        };

        let artifact = exporter
            .render(&empty, ExportFormat::GeoJson, "empty")
            .unwrap()
            .unwrap();
        assert_eq!(artifact.file_name, "empty.geojson");
        assert!(exporter.render(&empty, ExportFormat::Csv, "empty").unwrap().is_none());
    }
}
