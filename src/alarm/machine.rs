use tracing::{debug, info, warn};

use crate::{
    Error,
    actuator::{AlertActuator, AlertReport},
    feed::{self, PositionFeed, PositionSample},
    settings::Settings,
    shared::geo::Distance,
    stations::{Station, StationCatalog},
    store::{self, FALSE, IS_PLAYING_KEY, Store},
};

use super::{
    AlarmState, Config, Degraded, Event, Phase, Transition, Warning, alert,
    persisted::{self, Claim},
};

/// Snapshot of the machine for the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub phase: Phase,
    pub station: Option<Station>,
    pub last_distance: Option<Distance>,
    pub degraded: Option<Degraded>,
    pub last_alert: Option<AlertReport>,
    /// False while the store lags behind the in-memory state.
    pub persisted: bool,
}

/// Foreground side of the alarm. Owns the position watch and the alert
/// presented by this process.
///
/// Every event first re-reads the store so changes made by the background
/// task are never overwritten with stale in-memory state.
pub struct AlarmMachine<S, A, F>
where
    S: Store,
    A: AlertActuator,
    F: PositionFeed,
{
    config: Config,
    store: S,
    actuator: A,
    feed: F,
    state: AlarmState,
    degraded: Option<Degraded>,
    last_distance: Option<Distance>,
    last_alert: Option<AlertReport>,
    unsaved: bool,
    watching: bool,
    // Sound and vibration started by this process.
    alert_owned: bool,
    released: bool,
    // Raised while restoring, handed out with the next transition.
    pending: Vec<Warning>,
}

impl<S, A, F> AlarmMachine<S, A, F>
where
    S: Store,
    A: AlertActuator,
    F: PositionFeed,
{
    /// Rebuilds the machine from the store, resuming position tracking when
    /// the alarm was left armed by a previous process.
    ///
    /// Feed problems met on the way do not fail the restore. They are returned
    /// as warnings on the first [`Transition`] from [`handle`](Self::handle).
    pub fn restore(config: Config, store: S, actuator: A, feed: F) -> Result<Self, Error> {
        config.validate()?;
        let loaded = persisted::load(&store)?;
        let mut machine = Self {
            config,
            store,
            actuator,
            feed,
            state: loaded.state,
            degraded: None,
            last_distance: None,
            last_alert: None,
            unsaved: false,
            watching: false,
            alert_owned: false,
            released: false,
            pending: Vec::new(),
        };
        if !loaded.consistent {
            warn!("Persisted alarm state was inconsistent, resetting it to idle");
            machine.store.write_batch(persisted::disarm_batch())?;
        }

        let mut warnings = Vec::new();
        if let Some(name) = machine.state.station.as_ref().map(|s| s.name.clone()) {
            info!(phase = ?machine.state.phase, "Resuming alarm for {name}");
            machine.start_feed(&mut warnings);
        } else if machine.feed.is_background_registered() {
            info!("Removing background tracking left behind by an idle alarm");
            machine.stop_feed(&mut warnings);
        }
        machine.pending = warnings;
        Ok(machine)
    }

    /// Runs one event through the machine.
    ///
    /// Side effect failures never abort a transition, they come back as
    /// warnings on the returned [`Transition`].
    pub fn handle(&mut self, event: Event) -> Transition {
        let from = self.state.phase;
        let mut warnings = std::mem::take(&mut self.pending);
        self.released = false;
        self.reconcile(&mut warnings);
        match event {
            Event::Select(station) => self.arm(station, &mut warnings),
            Event::Sample(sample) => self.on_sample(&sample, &mut warnings),
            Event::Stop => self.disarm(&mut warnings),
            Event::Acknowledge => {
                info!("Alert acknowledged from notification");
                self.disarm(&mut warnings)
            }
        }
        debug!(?from, to = ?self.state.phase, "Handled alarm event");
        Transition {
            from,
            to: self.state.phase,
            warnings,
        }
    }

    pub fn arm_by_id(&mut self, catalog: &StationCatalog, id: &str) -> Result<Transition, Error> {
        let station = catalog.require_station(id)?.clone();
        Ok(self.handle(Event::Select(station)))
    }

    /// Pulls a one-off position from the feed and evaluates it.
    pub fn refresh_position(&mut self) -> Result<Transition, Error> {
        let sample = self.feed.current_position()?;
        Ok(self.handle(Event::Sample(sample)))
    }

    /// Releases the foreground watch and any sound or vibration this process
    /// started. Background tracking survives while the alarm is armed.
    /// Runs automatically on drop.
    pub fn teardown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if self.watching {
            if let Err(err) = self.feed.unwatch() {
                warn!("Could not stop position watch: {err}");
            }
            self.watching = false;
        }
        if self.alert_owned {
            if let Err(err) = self.actuator.stop_sound() {
                warn!("Could not stop alert sound: {err}");
            }
            if let Err(err) = self.actuator.stop_vibration() {
                warn!("Could not stop vibration: {err}");
            }
            self.alert_owned = false;
        }
        if !self.state.is_armed()
            && self.feed.is_background_registered()
            && let Err(err) = self.feed.unregister_background()
        {
            warn!("Could not stop background tracking: {err}");
        }
        debug!("Alarm machine released its resources");
    }

    pub fn state(&self) -> &AlarmState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn status(&self) -> Status {
        Status {
            phase: self.state.phase,
            station: self.state.station.clone(),
            last_distance: self.last_distance,
            degraded: self.degraded.clone(),
            last_alert: self.last_alert.clone(),
            persisted: !self.unsaved,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    fn reconcile(&mut self, warnings: &mut Vec<Warning>) {
        if self.unsaved {
            self.flush(warnings);
            if self.unsaved {
                return;
            }
        }
        let loaded = match persisted::load(&self.store) {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!("Could not read alarm state, continuing from memory: {err}");
                warnings.push(Warning::StateNotPersisted(err.to_string()));
                return;
            }
        };
        if !loaded.consistent {
            warn!("Persisted alarm state was inconsistent, resetting it to idle");
            let result = self.store.write_batch(persisted::disarm_batch());
            self.persist(result, warnings);
        }
        if loaded.state == self.state {
            return;
        }

        debug!(
            from = ?self.state.phase,
            to = ?loaded.state.phase,
            "Adopting persisted alarm state"
        );
        if !loaded.state.is_armed() && self.state.is_armed() {
            if self.alert_owned {
                self.stop_alert(warnings);
            }
            self.stop_feed(warnings);
        }
        self.state = loaded.state;
    }

    fn arm(&mut self, station: Station, warnings: &mut Vec<Warning>) {
        if self.state.phase == Phase::Alarming || self.alert_owned {
            info!("Re-arming while alarming, silencing the current alert");
            self.stop_alert(warnings);
        }
        let result = persisted::arm_batch(&station).and_then(|batch| self.store.write_batch(batch));
        self.persist(result, warnings);
        info!("Alarm armed for {}", station.name);
        self.state = AlarmState::armed(station);
        self.last_distance = None;
        self.last_alert = None;
        self.start_feed(warnings);
    }

    fn on_sample(&mut self, sample: &PositionSample, warnings: &mut Vec<Warning>) {
        let Some(station) = self.state.station.clone() else {
            debug!("Ignoring position while idle");
            return;
        };
        let distance = sample.coordinate.distance(&station.coordinate);
        self.last_distance = Some(distance);
        debug!(%distance, "Distance to {}", station.name);
        match self.state.phase {
            Phase::Armed if distance < self.config.trigger_radius => {
                self.fire(station, distance, warnings)
            }
            Phase::Alarming if distance >= self.config.release_radius => {
                self.release(station, distance, warnings)
            }
            _ => {}
        }
    }

    fn fire(&mut self, station: Station, distance: Distance, warnings: &mut Vec<Warning>) {
        match persisted::claim_alarm(&self.store, &station) {
            Ok(Claim::Claimed) => {}
            Ok(Claim::AlreadyFired) => {
                info!("Alarm for {} was already raised elsewhere", station.name);
                self.state = AlarmState::alarming(station);
                return;
            }
            Ok(Claim::Disarmed) => {
                info!("Alarm was stopped before it could fire");
                self.state = AlarmState::idle();
                self.stop_feed(warnings);
                return;
            }
            // The next reconcile adopts whatever episode replaced this one.
            Ok(Claim::Superseded) => return,
            Err(err) => {
                warn!("Could not claim alarm in store, firing from memory: {err}");
                self.unsaved = true;
                warnings.push(Warning::StateNotPersisted(err.to_string()));
            }
        }

        info!(%distance, "Within range of {}", station.name);
        let settings = self.settings();
        let report = alert::start(&mut self.actuator, &station.name, &settings);
        self.alert_owned = true;
        if report.all_failed() {
            warnings.push(Warning::AlertUnavailable(report.clone()));
        }
        self.last_alert = Some(report);
        self.state = AlarmState::alarming(station);
    }

    fn release(&mut self, station: Station, distance: Distance, warnings: &mut Vec<Warning>) {
        info!(%distance, "Left range of {}, silencing alert", station.name);
        let result = self.store.set(IS_PLAYING_KEY, FALSE);
        self.persist(result, warnings);
        self.stop_alert(warnings);
        self.state = AlarmState::armed(station);
    }

    fn disarm(&mut self, warnings: &mut Vec<Warning>) {
        if !self.state.is_armed() {
            debug!("Stop requested while idle");
            self.stop_feed(warnings);
            return;
        }
        let result = self.store.write_batch(persisted::disarm_batch());
        self.persist(result, warnings);
        self.stop_alert(warnings);
        self.stop_feed(warnings);
        info!("Alarm stopped");
        self.state = AlarmState::idle();
        self.degraded = None;
        self.last_distance = None;
    }

    fn stop_alert(&mut self, warnings: &mut Vec<Warning>) {
        for err in alert::stop(&mut self.actuator) {
            warnings.push(Warning::AlertStopFailed(err.to_string()));
        }
        self.alert_owned = false;
    }

    fn start_feed(&mut self, warnings: &mut Vec<Warning>) {
        self.degraded = None;
        if let Err(err) = self.feed.request_permission() {
            self.degrade(err, warnings);
            return;
        }
        if !self.watching {
            match self.feed.watch(&self.config.foreground) {
                Ok(()) => self.watching = true,
                Err(err) => self.degrade(err, warnings),
            }
        }
        if !self.feed.is_background_registered()
            && let Err(err) = self.feed.register_background(&self.config.background)
        {
            self.degrade(err, warnings);
        }
    }

    fn stop_feed(&mut self, warnings: &mut Vec<Warning>) {
        if self.watching {
            if let Err(err) = self.feed.unwatch() {
                warn!("Could not stop position watch: {err}");
                warnings.push(Warning::FeedStopFailed(err.to_string()));
            }
            self.watching = false;
        }
        if self.feed.is_background_registered()
            && let Err(err) = self.feed.unregister_background()
        {
            warn!("Could not stop background tracking: {err}");
            warnings.push(Warning::FeedStopFailed(err.to_string()));
        }
    }

    fn degrade(&mut self, err: feed::Error, warnings: &mut Vec<Warning>) {
        warn!("Alarm cannot track position: {err}");
        let degraded = Degraded::from(err);
        warnings.push(Warning::Degraded(degraded.clone()));
        self.degraded = Some(degraded);
    }

    fn persist(&mut self, result: Result<(), store::Error>, warnings: &mut Vec<Warning>) {
        if let Err(err) = result {
            warn!("Alarm state was not persisted, it will be lost on restart: {err}");
            self.unsaved = true;
            warnings.push(Warning::StateNotPersisted(err.to_string()));
        }
    }

    fn flush(&mut self, warnings: &mut Vec<Warning>) {
        let result = persisted::snapshot_batch(&self.state)
            .and_then(|batch| self.store.write_batch(batch));
        match result {
            Ok(()) => {
                info!("Alarm state persisted again");
                self.unsaved = false;
            }
            Err(err) => {
                warn!("Store is still unavailable: {err}");
                warnings.push(Warning::StateNotPersisted(err.to_string()));
            }
        }
    }

    fn settings(&self) -> Settings {
        Settings::load(&self.store).unwrap_or_else(|err| {
            warn!("Could not read alert settings, using defaults: {err}");
            Settings::default()
        })
    }
}

impl<S, A, F> Drop for AlarmMachine<S, A, F>
where
    S: Store,
    A: AlertActuator,
    F: PositionFeed,
{
    fn drop(&mut self) {
        self.teardown();
    }
}
