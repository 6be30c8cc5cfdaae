//! Location triggered alarm for transit stations.
//!
//! Pick a [`Station`](stations::Station), arm the
//! [`AlarmMachine`](alarm::AlarmMachine) and feed it positions; it raises an
//! alert once the device comes within a kilometer of the station and keeps a
//! background location task in agreement through a shared
//! [`Store`](store::Store).

pub mod actuator;
pub mod alarm;
mod error;
pub mod feed;
pub mod settings;
pub mod shared;
pub mod stations;
pub mod store;

pub use error::*;

pub mod prelude {
    pub use crate::{
        Error,
        actuator::{AlertActuator, AlertReport, Modality, ModalityOutcome},
        alarm::{
            AlarmMachine, AlarmState, BackgroundOutcome, BackgroundTask, Config, Event, Phase,
            Transition, Warning,
        },
        feed::{FeedConfig, PositionFeed, PositionSample},
        settings::Settings,
        shared::geo::{Coordinate, Distance},
        stations::{Line, Station, StationCatalog},
        store::{FileStore, MemoryStore, Store},
    };
}
