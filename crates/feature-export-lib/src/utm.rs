//! WGS84 to UTM coordinate projection
//!
//! Zone definitions are registered lazily in a [`ZoneRegistry`] the first time a
//! coordinate falls into a zone/hemisphere pair. Registration is idempotent, so two
//! exports probing the same zone concurrently end up sharing one definition.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use proj4rs::Proj;
use proj4rs::transform::transform;
use std::fmt;
use std::sync::Arc;

/// Source definition: WGS84 longitude/latitude
pub const WGS84_GEOGRAPHIC: &str = "+proj=longlat +ellps=WGS84 +datum=WGS84 +no_defs";

/// Northing offset applied in the southern hemisphere
pub const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Number of UTM zones around the globe
pub const UTM_ZONE_COUNT: i32 = 60;

/// Cell text used when the input coordinate is not a number
pub const NOT_AVAILABLE: &str = "N/A";

/// Cell text used when the projection itself failed
pub const PROJECTION_FAILED: &str = "Error";

/// Errors produced while projecting a single coordinate
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    #[error("Coordinate is not a number")]
    InvalidInput,

    #[error("Longitude {longitude} maps to zone {zone}, outside 1..=60")]
    ZoneOutOfRange { longitude: f64, zone: i32 },

    #[error("Latitude {0} is outside -90..=90")]
    LatitudeOutOfRange(f64),

    #[error("Invalid projection definition '{definition}': {reason}")]
    Definition { definition: String, reason: String },

    #[error("Projection of ({lat}, {lon}) failed: {reason}")]
    Transform { lat: f64, lon: f64, reason: String },

    #[error("Projection of ({lat}, {lon}) produced a non-finite result")]
    NonFiniteResult { lat: f64, lon: f64 },
}

impl ProjectionError {
    /// Text written in place of X, Y and zone when projection is not possible
    pub fn sentinel(&self) -> &'static str {
        match self {
            ProjectionError::InvalidInput => NOT_AVAILABLE,
            _ => PROJECTION_FAILED,
        }
    }
}

/// Hemisphere of a UTM zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Hemisphere {
    North,
    South,
}

impl Hemisphere {
    /// Southern when the latitude is strictly negative
    #[inline]
    pub fn from_latitude(lat: f64) -> Self {
        if lat < 0.0 {
            Hemisphere::South
        } else {
            Hemisphere::North
        }
    }

    /// Letter appended to the zone number in labels
    #[inline]
    pub fn suffix(self) -> char {
        match self {
            Hemisphere::North => 'N',
            Hemisphere::South => 'S',
        }
    }
}

/// Compute the UTM zone number for a longitude in degrees
///
/// Longitudes in `[-180, 180)` map to `1..=60`. Other values produce numbers
/// outside that range, which [`Projector::project`] rejects.
#[inline]
pub fn utm_zone(lon: f64) -> i32 {
    ((lon + 180.0) / 6.0).floor() as i32 + 1
}

/// Identifies a registered projection definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZoneKey {
    pub zone: u8,
    pub hemisphere: Hemisphere,
}

impl ZoneKey {
    pub fn new(zone: u8, hemisphere: Hemisphere) -> Self {
        Self { zone, hemisphere }
    }

    /// EPSG code of the WGS84 / UTM zone (326xx north, 327xx south)
    pub fn epsg_code(&self) -> u32 {
        let base = match self.hemisphere {
            Hemisphere::North => 32600,
            Hemisphere::South => 32700,
        };
        base + self.zone as u32
    }
}

/// Projection definition for one UTM zone
///
/// Holds the geographic source and UTM target definitions, both parsed once
/// when the zone is registered.
pub struct ZoneDefinition {
    key: ZoneKey,
    geographic: Proj,
    utm: Proj,
}

impl fmt::Debug for ZoneDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneDefinition")
            .field("key", &self.key)
            .field("definition", &self.proj_string())
            .finish()
    }
}

impl ZoneDefinition {
    pub fn new(key: ZoneKey) -> Result<Self, ProjectionError> {
        let parse = |definition: &str| {
            Proj::from_proj_string(definition).map_err(|err| ProjectionError::Definition {
                definition: definition.to_string(),
                reason: err.to_string(),
            })
        };

        Ok(Self {
            key,
            geographic: parse(WGS84_GEOGRAPHIC)?,
            utm: parse(&zone_proj_string(key))?,
        })
    }

    #[inline]
    pub fn key(&self) -> ZoneKey {
        self.key
    }

    /// PROJ-style definition string of the zone
    pub fn proj_string(&self) -> String {
        zone_proj_string(self.key)
    }

    /// Project geographic degrees to (easting, northing) in meters
    pub fn forward(&self, lat: f64, lon: f64) -> Result<(f64, f64), ProjectionError> {
        // Geographic input is in radians, lon first
        let mut point = (lon.to_radians(), lat.to_radians(), 0.0);
        transform(&self.geographic, &self.utm, &mut point).map_err(|err| {
            ProjectionError::Transform {
                lat,
                lon,
                reason: err.to_string(),
            }
        })?;
        Ok((point.0, point.1))
    }
}

fn zone_proj_string(key: ZoneKey) -> String {
    let south = match key.hemisphere {
        Hemisphere::North => "",
        Hemisphere::South => " +south",
    };
    format!(
        "+proj=utm +zone={}{} +ellps=WGS84 +datum=WGS84 +units=m +no_defs",
        key.zone, south
    )
}

/// Thread-safe cache of zone definitions
///
/// Probing and registering the same key from several threads is harmless: the
/// first insert wins and every caller receives that definition.
#[derive(Debug, Default)]
pub struct ZoneRegistry {
    definitions: DashMap<ZoneKey, Arc<ZoneDefinition>>,
}

impl ZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the definition for `key`, returning the existing one if present
    pub fn register(&self, key: ZoneKey) -> Result<Arc<ZoneDefinition>, ProjectionError> {
        match self.definitions.entry(key) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let definition = Arc::new(ZoneDefinition::new(key)?);
                tracing::debug!(
                    "Registered EPSG:{} as {}",
                    key.epsg_code(),
                    definition.proj_string()
                );
                entry.insert(definition.clone());
                Ok(definition)
            }
        }
    }

    pub fn get(&self, key: &ZoneKey) -> Option<Arc<ZoneDefinition>> {
        self.definitions.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &ZoneKey) -> bool {
        self.definitions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// A coordinate projected into its UTM zone
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UtmCoordinate {
    pub easting: f64,
    pub northing: f64,
    pub zone: u8,
    pub hemisphere: Hemisphere,
}

impl UtmCoordinate {
    /// Easting with two decimals
    pub fn easting_label(&self) -> String {
        format!("{:.2}", self.easting)
    }

    /// Northing with two decimals
    pub fn northing_label(&self) -> String {
        format!("{:.2}", self.northing)
    }

    /// Zone number followed by the hemisphere letter, e.g. `21S`
    pub fn zone_label(&self) -> String {
        format!("{}{}", self.zone, self.hemisphere.suffix())
    }
}

impl fmt::Display for UtmCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.zone_label(),
            self.easting_label(),
            self.northing_label()
        )
    }
}

/// Projects WGS84 coordinates to UTM, registering zones on demand
#[derive(Debug, Clone, Default)]
pub struct Projector {
    registry: Arc<ZoneRegistry>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Projector {
    /// Create a projector sharing the given registry
    pub fn new(registry: Arc<ZoneRegistry>) -> Self {
        Self { registry }
    }

    #[inline]
    pub fn registry(&self) -> &Arc<ZoneRegistry> {
        &self.registry
    }

    /// Project a latitude/longitude pair in degrees
    ///
    /// `NaN` input yields [`ProjectionError::InvalidInput`]. Every other failure is
    /// logged and returned so the caller can degrade to a sentinel.
    pub fn project(&self, lat: f64, lon: f64) -> Result<UtmCoordinate, ProjectionError> {
        if lat.is_nan() || lon.is_nan() {
            return Err(ProjectionError::InvalidInput);
        }

        let result = self.project_checked(lat, lon);
        if let Err(err) = &result {
            tracing::warn!("UTM conversion failed: {err}");
        }
        result
    }

    fn project_checked(&self, lat: f64, lon: f64) -> Result<UtmCoordinate, ProjectionError> {
        let zone = utm_zone(lon);
        if !(1..=UTM_ZONE_COUNT).contains(&zone) {
            return Err(ProjectionError::ZoneOutOfRange {
                longitude: lon,
                zone,
            });
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ProjectionError::LatitudeOutOfRange(lat));
        }

        let hemisphere = Hemisphere::from_latitude(lat);
        let definition = self
            .registry
            .register(ZoneKey::new(zone as u8, hemisphere))?;
        let (easting, northing) = definition.forward(lat, lon)?;

        if !easting.is_finite() || !northing.is_finite() {
            return Err(ProjectionError::NonFiniteResult { lat, lon });
        }

        Ok(UtmCoordinate {
            easting,
            northing,
            zone: zone as u8,
            hemisphere,
        })
    }
}
