#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use nearstop::{
    actuator::{self, AlertActuator, Modality},
    feed::{self, FeedConfig, PositionFeed, PositionSample},
    shared::geo::Coordinate,
    stations::{Line, Station},
    store::{self, Batch, MemoryStore, Store},
};

/// Kilometers per degree of latitude on the haversine sphere.
pub const KM_PER_DEGREE: f64 = 6371.0 * std::f64::consts::PI / 180.0;

pub fn koltsevaya() -> Line {
    Line {
        id: "5".into(),
        name: "Koltsevaya".into(),
        color: Some("915133".into()),
    }
}

pub fn kurskaya() -> Station {
    Station::new(
        "kurskaya-5",
        "Kurskaya",
        Coordinate::new(55.7586, 37.6590),
        koltsevaya(),
    )
}

pub fn paveletskaya() -> Station {
    Station::new(
        "paveletskaya-5",
        "Paveletskaya",
        Coordinate::new(55.7316, 37.6366),
        koltsevaya(),
    )
}

/// A point `km` due north of the station.
pub fn north_of(station: &Station, km: f64) -> Coordinate {
    Coordinate::new(
        station.coordinate.latitude + km / KM_PER_DEGREE,
        station.coordinate.longitude,
    )
}

pub fn sample_north_of(station: &Station, km: f64) -> PositionSample {
    PositionSample::new(north_of(station, km))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    ShowNotification,
    DismissNotifications,
    StartSound,
    StopSound,
    StartVibration,
    StopVibration,
}

/// Actuator that records every call. Clones share the same log so a test can
/// keep a handle after moving one into the machine.
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    calls: Arc<Mutex<Vec<Call>>>,
    notified: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<Vec<Modality>>>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn failing(modalities: &[Modality]) -> Self {
        let actuator = Self::new();
        actuator
            .failing
            .lock()
            .unwrap()
            .extend_from_slice(modalities);
        actuator
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    pub fn notified(&self) -> Vec<String> {
        self.notified.lock().unwrap().clone()
    }

    fn record(&self, call: Call, starts: Option<Modality>) -> Result<(), actuator::Error> {
        self.calls.lock().unwrap().push(call);
        match starts {
            Some(modality) if self.failing.lock().unwrap().contains(&modality) => {
                Err(actuator::Error::Failed {
                    modality,
                    reason: "device busy".into(),
                })
            }
            _ => Ok(()),
        }
    }
}

impl AlertActuator for RecordingActuator {
    fn show_notification(&mut self, station_name: &str) -> Result<(), actuator::Error> {
        self.notified.lock().unwrap().push(station_name.to_string());
        self.record(Call::ShowNotification, Some(Modality::Notification))
    }

    fn dismiss_notifications(&mut self) -> Result<(), actuator::Error> {
        self.record(Call::DismissNotifications, None)
    }

    fn start_sound(&mut self) -> Result<(), actuator::Error> {
        self.record(Call::StartSound, Some(Modality::Sound))
    }

    fn stop_sound(&mut self) -> Result<(), actuator::Error> {
        self.record(Call::StopSound, None)
    }

    fn start_vibration(&mut self) -> Result<(), actuator::Error> {
        self.record(Call::StartVibration, Some(Modality::Vibration))
    }

    fn stop_vibration(&mut self) -> Result<(), actuator::Error> {
        self.record(Call::StopVibration, None)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeedState {
    pub permission_denied: bool,
    pub watch_error: Option<feed::Error>,
    pub background_error: Option<feed::Error>,
    pub unregister_error: Option<feed::Error>,
    pub position: Option<Coordinate>,
    pub watching: bool,
    pub background: bool,
    pub watch_calls: usize,
    pub register_calls: usize,
    pub unregister_calls: usize,
    pub background_config: Option<FeedConfig>,
}

/// Feed whose behaviour is set up front. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFeed {
    inner: Arc<Mutex<FeedState>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with(state: FeedState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub fn denied() -> Self {
        Self::with(FeedState {
            permission_denied: true,
            ..Default::default()
        })
    }

    pub fn state(&self) -> FeedState {
        self.inner.lock().unwrap().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut FeedState)) {
        f(&mut self.inner.lock().unwrap());
    }
}

impl PositionFeed for ScriptedFeed {
    fn request_permission(&mut self) -> Result<(), feed::Error> {
        if self.inner.lock().unwrap().permission_denied {
            Err(feed::Error::PermissionDenied)
        } else {
            Ok(())
        }
    }

    fn current_position(&mut self) -> Result<PositionSample, feed::Error> {
        self.inner
            .lock()
            .unwrap()
            .position
            .map(PositionSample::new)
            .ok_or_else(|| feed::Error::Unavailable("no fix yet".into()))
    }

    fn watch(&mut self, _config: &FeedConfig) -> Result<(), feed::Error> {
        let mut state = self.inner.lock().unwrap();
        if let Some(err) = state.watch_error.clone() {
            return Err(err);
        }
        state.watching = true;
        state.watch_calls += 1;
        Ok(())
    }

    fn unwatch(&mut self) -> Result<(), feed::Error> {
        self.inner.lock().unwrap().watching = false;
        Ok(())
    }

    fn register_background(&mut self, config: &FeedConfig) -> Result<(), feed::Error> {
        let mut state = self.inner.lock().unwrap();
        if let Some(err) = state.background_error.clone() {
            return Err(err);
        }
        state.background = true;
        state.register_calls += 1;
        state.background_config = Some(*config);
        Ok(())
    }

    fn unregister_background(&mut self) -> Result<(), feed::Error> {
        let mut state = self.inner.lock().unwrap();
        state.unregister_calls += 1;
        if let Some(err) = state.unregister_error.clone() {
            return Err(err);
        }
        state.background = false;
        Ok(())
    }

    fn is_background_registered(&self) -> bool {
        self.inner.lock().unwrap().background
    }
}

/// Memory store that can be switched off to simulate storage failures.
#[derive(Debug, Clone, Default)]
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    broken: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), store::Error> {
        if self.broken.load(Ordering::SeqCst) {
            Err(store::Error::Unavailable("disk full".into()))
        } else {
            Ok(())
        }
    }
}

impl Store for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, store::Error> {
        self.check()?;
        self.inner.get(key)
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, store::Error> {
        self.check()?;
        self.inner.get_many(keys)
    }

    fn write_batch(&self, batch: Batch) -> Result<(), store::Error> {
        self.check()?;
        self.inner.write_batch(batch)
    }

    fn swap(&self, key: &str, value: &str) -> Result<Option<String>, store::Error> {
        self.check()?;
        self.inner.swap(key, value)
    }
}
