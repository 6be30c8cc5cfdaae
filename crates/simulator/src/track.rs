use std::path::Path;

use nearstop::shared::geo::Coordinate;
use serde::Deserialize;

/// One row of a recorded trip.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TrackPoint {
    /// Seconds since the start of the trip.
    pub offset: u64,
    pub lat: f64,
    pub lng: f64,
}

/// A trip recorded as `offset,lat,lng` rows.
#[derive(Debug, Clone, Default)]
pub struct Track {
    points: Vec<TrackPoint>,
}

impl Track {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, csv::Error> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut points = reader
            .deserialize()
            .collect::<Result<Vec<TrackPoint>, _>>()?;
        points.sort_by_key(|point| point.offset);
        Ok(Self { points })
    }

    pub fn duration(&self) -> u64 {
        self.points.last().map_or(0, |point| point.offset)
    }

    /// Last recorded position at or before `second`.
    pub fn position_at(&self, second: u64) -> Option<Coordinate> {
        let index = self.points.partition_point(|point| point.offset <= second);
        let point = self.points.get(index.checked_sub(1)?)?;
        Some(Coordinate::new(point.lat, point.lng))
    }
}
