use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::shared::{Identifiable, fuzzy, geo::Coordinate};

/// A transit line a station belongs to (e.g. "Koltsevaya").
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub id: Arc<str>,
    pub name: Arc<str>,
    /// Display color as a hex string without the leading `#`.
    #[serde(rename = "hex_color", default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Arc<str>>,
}

/// A station the alarm can be armed on.
///
/// Serializes to the flat `{ id, name, lat, lng, order, line }` shape that is
/// persisted under the `selectedStation` key.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StationRecord", into = "StationRecord")]
pub struct Station {
    pub id: Arc<str>,
    pub name: Arc<str>,
    /// Normalized name used for fuzzy search comparisons.
    pub normalized_name: Arc<str>,
    pub coordinate: Coordinate,
    /// Position of the station along its line.
    pub order: u32,
    pub line: Line,
}

impl Station {
    pub fn new(
        id: impl Into<Arc<str>>,
        name: impl Into<Arc<str>>,
        coordinate: Coordinate,
        line: Line,
    ) -> Self {
        let name: Arc<str> = name.into();
        Self {
            id: id.into(),
            normalized_name: fuzzy::normalize(&name).into(),
            name,
            coordinate,
            order: 0,
            line,
        }
    }
}

impl Identifiable for Station {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn normalized_name(&self) -> &str {
        &self.normalized_name
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct StationRecord {
    id: Arc<str>,
    name: Arc<str>,
    lat: f64,
    lng: f64,
    #[serde(default)]
    order: u32,
    line: Line,
}

impl From<StationRecord> for Station {
    fn from(value: StationRecord) -> Self {
        let mut station = Station::new(
            value.id,
            value.name,
            Coordinate::new(value.lat, value.lng),
            value.line,
        );
        station.order = value.order;
        station
    }
}

impl From<Station> for StationRecord {
    fn from(value: Station) -> Self {
        Self {
            id: value.id,
            name: value.name,
            lat: value.coordinate.latitude,
            lng: value.coordinate.longitude,
            order: value.order,
            line: value.line,
        }
    }
}

/// Station dataset as shipped with the app: stations grouped by line.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DatasetFile {
    pub lines: Vec<DatasetLine>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DatasetLine {
    pub id: String,
    pub name: String,
    pub hex_color: Option<String>,
    pub stations: Vec<DatasetStation>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DatasetStation {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub order: u32,
}
