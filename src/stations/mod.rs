use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
    sync::Arc,
};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

mod models;
pub use models::*;

use crate::shared::{
    self,
    geo::{Coordinate, Distance},
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Station id {0} appears more than once")]
    DuplicateStation(String),
    #[error("Could not find station with id: {0}")]
    StationNotFound(String),
}

type IdToIndex = HashMap<Arc<str>, usize>;

/// Read-only station dataset, built once at startup and shared by reference.
#[derive(Debug, Clone, Default)]
pub struct StationCatalog {
    pub stations: Box<[Station]>,
    pub lines: Box<[Line]>,

    station_lookup: Arc<IdToIndex>,
}

impl StationCatalog {
    pub fn new() -> Self {
        Default::default()
    }

    /// Opens and parses a dataset file, see [`StationCatalog::from_json`].
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path.as_ref())?;
        info!("Loading stations from {}", path.as_ref().display());
        Self::from_json(BufReader::new(file))
    }

    /// Parses the `{ "lines": [ { "stations": [...] } ] }` dataset format.
    pub fn from_json<R: Read>(reader: R) -> Result<Self, Error> {
        let dataset: DatasetFile = serde_json::from_reader(reader)?;
        let mut lines = Vec::with_capacity(dataset.lines.len());
        let mut stations = Vec::new();
        for raw_line in dataset.lines {
            let line = Line {
                id: raw_line.id.into(),
                name: raw_line.name.into(),
                color: raw_line.hex_color.map(Into::into),
            };
            stations.extend(raw_line.stations.into_iter().map(|raw| {
                let mut station = Station::new(
                    raw.id,
                    raw.name,
                    Coordinate::new(raw.lat, raw.lng),
                    line.clone(),
                );
                station.order = raw.order;
                station
            }));
            lines.push(line);
        }
        let mut catalog = Self::with_stations(stations)?;
        catalog.lines = lines.into();
        debug!(
            "Loaded {} stations on {} lines",
            catalog.stations.len(),
            catalog.lines.len()
        );
        Ok(catalog)
    }

    pub fn with_stations(stations: Vec<Station>) -> Result<Self, Error> {
        let mut station_lookup: IdToIndex = HashMap::with_capacity(stations.len());
        for (i, station) in stations.iter().enumerate() {
            if station_lookup.insert(station.id.clone(), i).is_some() {
                return Err(Error::DuplicateStation(station.id.to_string()));
            }
        }
        let mut lines: Vec<Line> = Vec::new();
        for station in &stations {
            if !lines.iter().any(|line| line.id == station.line.id) {
                lines.push(station.line.clone());
            }
        }
        Ok(Self {
            stations: stations.into(),
            lines: lines.into(),
            station_lookup: station_lookup.into(),
        })
    }

    /// Get a station with the given id.
    /// If no station is found with the given id None is returned.
    pub fn station_by_id(&self, id: &str) -> Option<&Station> {
        let index = self.station_lookup.get(id)?;
        Some(&self.stations[*index])
    }

    /// Like [`StationCatalog::station_by_id`] but fails with
    /// [`Error::StationNotFound`].
    pub fn require_station(&self, id: &str) -> Result<&Station, Error> {
        self.station_by_id(id)
            .ok_or_else(|| Error::StationNotFound(id.to_string()))
    }

    pub fn stations_by_line_id(&self, line_id: &str) -> Vec<&Station> {
        let mut stations: Vec<_> = self
            .stations
            .iter()
            .filter(|station| &*station.line.id == line_id)
            .collect();
        stations.sort_by_key(|station| station.order);
        stations
    }

    /// Does a fuzzy search on all the stations, comparing their name to the needle.
    pub fn search_by_name<'a>(&'a self, needle: &str) -> Vec<&'a Station> {
        shared::search(needle, &self.stations)
    }

    /// Returns stations within `distance` of the coordinate, closest first.
    pub fn stations_near(
        &self,
        coordinate: &Coordinate,
        distance: Distance,
    ) -> Vec<(&Station, Distance)> {
        let mut near: Vec<_> = self
            .stations
            .par_iter()
            .filter_map(|station| {
                let d = station.coordinate.distance(coordinate);
                (d <= distance).then_some((station, d))
            })
            .collect();
        near.par_sort_unstable_by(|(_, a), (_, b)| {
            a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
        });
        near
    }

    pub fn nearest(&self, coordinate: &Coordinate) -> Option<(&Station, Distance)> {
        self.stations
            .par_iter()
            .map(|station| (station, station.coordinate.distance(coordinate)))
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }
}
