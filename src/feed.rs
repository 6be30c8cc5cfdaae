use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::geo::{Coordinate, Distance};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Location permission was denied")]
    PermissionDenied,
    #[error("Position feed is unavailable: {0}")]
    Unavailable(String),
}

/// How often the platform should deliver positions.
/// A sample is due once either threshold is crossed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedConfig {
    pub min_interval: Duration,
    pub min_distance: Distance,
}

impl FeedConfig {
    /// Live watch while the app is visible.
    pub const fn foreground() -> Self {
        Self {
            min_interval: Duration::from_secs(1),
            min_distance: Distance::from_meters(10.0),
        }
    }

    /// OS scheduled task while the app is in the background.
    pub const fn background() -> Self {
        Self {
            min_interval: Duration::from_secs(5),
            min_distance: Distance::from_meters(10.0),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::foreground()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub coordinate: Coordinate,
    pub timestamp: DateTime<Utc>,
}

impl PositionSample {
    pub fn new(coordinate: Coordinate) -> Self {
        Self::at(coordinate, Utc::now())
    }

    pub fn at(coordinate: Coordinate, timestamp: DateTime<Utc>) -> Self {
        Self {
            coordinate,
            timestamp,
        }
    }
}

impl From<Coordinate> for PositionSample {
    fn from(coordinate: Coordinate) -> Self {
        Self::new(coordinate)
    }
}

/// Platform location capability.
///
/// Implementations only manage subscriptions. Samples produced by a
/// subscription are handed to the alarm as events by the platform glue, the
/// foreground watch into [`crate::alarm::AlarmMachine::handle`] and the
/// background callback into [`crate::alarm::BackgroundTask::on_locations`].
pub trait PositionFeed {
    fn request_permission(&mut self) -> Result<(), Error>;

    fn current_position(&mut self) -> Result<PositionSample, Error>;

    fn watch(&mut self, config: &FeedConfig) -> Result<(), Error>;

    fn unwatch(&mut self) -> Result<(), Error>;

    fn register_background(&mut self, config: &FeedConfig) -> Result<(), Error>;

    fn unregister_background(&mut self) -> Result<(), Error>;

    fn is_background_registered(&self) -> bool;
}
