//! The proximity alarm state machine.
//!
//! ```text
//!            select(station)            d < trigger radius
//!  Idle ─────────────────────► Armed ──────────────────────► Alarming
//!   ▲                          │  ▲                            │
//!   │        stop / ack        │  │     d >= release radius    │
//!   ├──────────────────────────┘  └────────────────────────────┤
//!   │                          stop / ack                      │
//!   └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Selecting a station while Armed or Alarming re-arms on the new station and
//! silences any running alert first.
//!
//! [`AlarmMachine`] runs in the foreground process and drives every edge.
//! [`BackgroundTask`] runs in the OS scheduled location callback and only ever
//! takes the Armed → Alarming edge. The two never share memory; both treat the
//! [`Store`](crate::store::Store) as the source of truth and claim an alarm with
//! an atomic swap of `isPlayingAlarm`, so the alert is started at most once per
//! arming episode no matter which side sees the sample first.

use crate::{
    Error,
    actuator::AlertReport,
    feed::{self, FeedConfig, PositionSample},
    shared::geo::Distance,
    stations::Station,
};

mod alert;
mod background;
mod machine;
pub(crate) mod persisted;

pub use background::*;
pub use machine::*;

/// Radius around the station that sets the alarm off.
pub const ALARM_DISTANCE: Distance = Distance::from_kilometers(1.0);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    #[default]
    Idle,
    /// Watching for the station to come within range.
    Armed,
    /// Alert is being presented.
    Alarming,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct AlarmState {
    pub station: Option<Station>,
    pub phase: Phase,
    pub alarm_fired: bool,
}

impl AlarmState {
    pub fn idle() -> Self {
        Default::default()
    }

    pub fn armed(station: Station) -> Self {
        Self {
            station: Some(station),
            phase: Phase::Armed,
            alarm_fired: false,
        }
    }

    pub fn alarming(station: Station) -> Self {
        Self {
            station: Some(station),
            phase: Phase::Alarming,
            alarm_fired: true,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.phase != Phase::Idle
    }
}

/// Every external trigger the machine reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The user picked a station and started the alarm.
    Select(Station),
    /// A position from the foreground watch.
    Sample(PositionSample),
    /// The user pressed stop in the app.
    Stop,
    /// The user hit "stop" on the alert notification.
    Acknowledge,
}

/// Why an armed alarm is not receiving positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degraded {
    PermissionDenied,
    FeedUnavailable(String),
}

impl From<feed::Error> for Degraded {
    fn from(value: feed::Error) -> Self {
        match value {
            feed::Error::PermissionDenied => Degraded::PermissionDenied,
            feed::Error::Unavailable(reason) => Degraded::FeedUnavailable(reason),
        }
    }
}

/// Non fatal problems surfaced to the UI alongside a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// The store rejected a write, state will not survive a restart until a
    /// later write succeeds.
    StateNotPersisted(String),
    /// Every attempted alert modality failed.
    AlertUnavailable(AlertReport),
    AlertStopFailed(String),
    FeedStopFailed(String),
    Degraded(Degraded),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    pub warnings: Vec<Warning>,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Entering this radius starts the alert (strict `<`).
    pub trigger_radius: Distance,
    /// Leaving this radius silences the alert (`>=`). A value above
    /// `trigger_radius` adds hysteresis against chatter at the boundary.
    pub release_radius: Distance,
    pub foreground: FeedConfig,
    pub background: FeedConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trigger_radius: ALARM_DISTANCE,
            release_radius: ALARM_DISTANCE,
            foreground: FeedConfig::foreground(),
            background: FeedConfig::background(),
        }
    }
}

impl Config {
    pub fn with_release_radius(mut self, release_radius: Distance) -> Self {
        self.release_radius = release_radius;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        let trigger = self.trigger_radius.as_meters();
        if trigger.is_nan() || trigger <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "trigger radius must be positive, got {}",
                self.trigger_radius
            )));
        }
        if self.release_radius < self.trigger_radius {
            return Err(Error::InvalidConfig(format!(
                "release radius {} is inside trigger radius {}",
                self.release_radius, self.trigger_radius
            )));
        }
        Ok(())
    }
}

#[test]
fn config_rejects_release_inside_trigger() {
    let config = Config::default().with_release_radius(Distance::from_meters(800.0));
    assert!(config.validate().is_err());
    assert!(Config::default().validate().is_ok());
}
