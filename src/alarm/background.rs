use tracing::{debug, info, warn};

use crate::{
    Error,
    actuator::{AlertActuator, AlertReport},
    feed::PositionSample,
    settings::Settings,
    shared::geo::Distance,
    store::Store,
};

use super::{
    Config, Phase, alert,
    persisted::{self, Claim},
};

#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundOutcome {
    /// The callback delivered no positions.
    NoSamples,
    /// Nothing is armed, the task has nothing to do.
    Idle,
    /// Armed and still out of range.
    Waiting(Distance),
    /// This invocation started the alert.
    Fired {
        distance: Distance,
        report: AlertReport,
    },
    /// The alert is already running, started here or by the foreground.
    AlreadyAlarming,
    /// The alarm was re-armed while this run was deciding, nothing was started.
    Superseded,
}

/// Evaluator for the OS scheduled background location callback.
///
/// Holds no alarm state of its own. Each invocation reads everything from the
/// store and only ever takes the Armed → Alarming edge, every other transition
/// belongs to the foreground [`AlarmMachine`](super::AlarmMachine).
pub struct BackgroundTask<S, A>
where
    S: Store,
    A: AlertActuator,
{
    config: Config,
    store: S,
    actuator: A,
}

impl<S, A> BackgroundTask<S, A>
where
    S: Store,
    A: AlertActuator,
{
    pub fn new(config: Config, store: S, actuator: A) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            actuator,
        })
    }

    /// Handles one batch of positions, oldest first.
    ///
    /// Store failures are returned as errors since there is no in-memory state
    /// to fall back on; the next invocation simply tries again.
    pub fn on_locations(&mut self, samples: &[PositionSample]) -> Result<BackgroundOutcome, Error> {
        if samples.is_empty() {
            return Ok(BackgroundOutcome::NoSamples);
        }
        let loaded = persisted::load(&self.store)?;
        let state = loaded.state;
        let Some(station) = state.station else {
            debug!("Background positions while idle, nothing to do");
            return Ok(BackgroundOutcome::Idle);
        };
        if state.phase == Phase::Alarming {
            return Ok(BackgroundOutcome::AlreadyAlarming);
        }

        let mut last = Distance::default();
        for sample in samples {
            let distance = sample.coordinate.distance(&station.coordinate);
            last = distance;
            if distance >= self.config.trigger_radius {
                continue;
            }

            return match persisted::claim_alarm(&self.store, &station)? {
                Claim::Claimed => {
                    info!(%distance, "Within range of {} while in background", station.name);
                    let settings = Settings::load(&self.store).unwrap_or_else(|err| {
                        warn!("Could not read alert settings, using defaults: {err}");
                        Settings::default()
                    });
                    let report = alert::start(&mut self.actuator, &station.name, &settings);
                    Ok(BackgroundOutcome::Fired { distance, report })
                }
                Claim::AlreadyFired => Ok(BackgroundOutcome::AlreadyAlarming),
                Claim::Disarmed => Ok(BackgroundOutcome::Idle),
                Claim::Superseded => Ok(BackgroundOutcome::Superseded),
            };
        }
        debug!(distance = %last, "Background position out of range of {}", station.name);
        Ok(BackgroundOutcome::Waiting(last))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }
}
