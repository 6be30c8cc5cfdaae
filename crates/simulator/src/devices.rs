use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use nearstop::{
    actuator::{self, AlertActuator},
    feed::{self, FeedConfig, PositionFeed, PositionSample},
};
use tracing::{debug, info};

use crate::track::Track;

/// Simulated seconds since the trip started.
#[derive(Debug, Clone, Default)]
pub struct Clock(Arc<AtomicU64>);

impl Clock {
    pub fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Prints alerts instead of ringing.
#[derive(Debug, Clone, Copy)]
pub struct LogActuator {
    context: &'static str,
}

impl LogActuator {
    pub fn new(context: &'static str) -> Self {
        Self { context }
    }
}

impl AlertActuator for LogActuator {
    fn show_notification(&mut self, station_name: &str) -> Result<(), actuator::Error> {
        info!(context = self.context, "NOTIFICATION: approaching {station_name}");
        Ok(())
    }

    fn dismiss_notifications(&mut self) -> Result<(), actuator::Error> {
        debug!(context = self.context, "Notifications dismissed");
        Ok(())
    }

    fn start_sound(&mut self) -> Result<(), actuator::Error> {
        info!(context = self.context, "Alarm sound on");
        Ok(())
    }

    fn stop_sound(&mut self) -> Result<(), actuator::Error> {
        info!(context = self.context, "Alarm sound off");
        Ok(())
    }

    fn start_vibration(&mut self) -> Result<(), actuator::Error> {
        info!(context = self.context, "Vibration on");
        Ok(())
    }

    fn stop_vibration(&mut self) -> Result<(), actuator::Error> {
        info!(context = self.context, "Vibration off");
        Ok(())
    }
}

/// Replays a [`Track`] against the shared [`Clock`].
///
/// Clones share the background registration, so the background loop sees
/// what the alarm machine registered.
#[derive(Debug, Clone)]
pub struct SimulatedFeed {
    track: Arc<Track>,
    clock: Clock,
    background: Arc<AtomicBool>,
    watching: bool,
}

impl SimulatedFeed {
    pub fn new(track: Arc<Track>, clock: Clock) -> Self {
        Self {
            track,
            clock,
            background: Default::default(),
            watching: false,
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watching
    }

    /// Samples recorded in `(after, until]`, one per simulated second.
    pub fn samples_between(&self, after: u64, until: u64) -> Vec<PositionSample> {
        (after + 1..=until)
            .filter_map(|second| self.track.position_at(second))
            .map(PositionSample::new)
            .collect()
    }
}

impl PositionFeed for SimulatedFeed {
    fn request_permission(&mut self) -> Result<(), feed::Error> {
        Ok(())
    }

    fn current_position(&mut self) -> Result<PositionSample, feed::Error> {
        self.track
            .position_at(self.clock.now())
            .map(PositionSample::new)
            .ok_or_else(|| feed::Error::Unavailable("trip has not started".into()))
    }

    fn watch(&mut self, config: &FeedConfig) -> Result<(), feed::Error> {
        debug!(interval = ?config.min_interval, "Foreground watch started");
        self.watching = true;
        Ok(())
    }

    fn unwatch(&mut self) -> Result<(), feed::Error> {
        debug!("Foreground watch stopped");
        self.watching = false;
        Ok(())
    }

    fn register_background(&mut self, config: &FeedConfig) -> Result<(), feed::Error> {
        debug!(interval = ?config.min_interval, "Background task registered");
        self.background.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unregister_background(&mut self) -> Result<(), feed::Error> {
        debug!("Background task unregistered");
        self.background.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_background_registered(&self) -> bool {
        self.background.load(Ordering::SeqCst)
    }
}
