mod devices;
mod track;

use std::{path::PathBuf, sync::Arc, time::Duration};

use nearstop::{
    alarm::{AlarmMachine, BackgroundOutcome, BackgroundTask, Config, Event, Transition},
    feed::PositionFeed,
    stations::{self, StationCatalog},
    store::{self, FileStore},
};
use thiserror::Error;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::{
    devices::{Clock, LogActuator, SimulatedFeed},
    track::Track,
};

/// Wall time of one simulated second.
const TICK: Duration = Duration::from_millis(100);
const USAGE: &str =
    "nearstop-sim <stations.json> <track.csv> <station id> [store.json] [hide after seconds]";

type Machine = AlarmMachine<Arc<FileStore>, LogActuator, SimulatedFeed>;

#[derive(Error, Debug)]
enum Error {
    #[error("Usage: {}", USAGE)]
    Usage,
    #[error("Invalid number of seconds: {0}")]
    InvalidSeconds(String),
    #[error(transparent)]
    Alarm(#[from] nearstop::Error),
    #[error(transparent)]
    Stations(#[from] stations::Error),
    #[error(transparent)]
    Store(#[from] store::Error),
    #[error("Could not read track: {0}")]
    Track(#[from] csv::Error),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

struct Args {
    stations: PathBuf,
    track: PathBuf,
    station_id: String,
    store: PathBuf,
    /// Second at which the app is closed, leaving only the background task.
    hide_after: Option<u64>,
}

impl Args {
    fn parse() -> Result<Self, Error> {
        let mut args = std::env::args().skip(1);
        let (Some(stations), Some(track), Some(station_id)) = (args.next(), args.next(), args.next())
        else {
            return Err(Error::Usage);
        };
        let store = args
            .next()
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("nearstop-store.json"));
        let hide_after = args
            .next()
            .map(|value| value.parse().map_err(|_| Error::InvalidSeconds(value)))
            .transpose()?;
        Ok(Self {
            stations: stations.into(),
            track: track.into(),
            station_id,
            store,
            hide_after,
        })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();

    if let Err(err) = run().await {
        error!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Error> {
    let args = Args::parse()?;
    let catalog = StationCatalog::from_path(&args.stations)?;
    let station = catalog.require_station(&args.station_id)?.clone();
    let track = Arc::new(Track::from_path(&args.track)?);
    let store = Arc::new(FileStore::open(&args.store)?);
    info!(
        "Simulating {} s of travel towards {}, state in {}",
        track.duration(),
        station.name,
        store.path().display()
    );

    let clock = Clock::default();
    let feed = SimulatedFeed::new(track.clone(), clock.clone());
    let config = Config::default();

    let background = tokio::spawn(background_loop(
        config,
        store.clone(),
        feed.clone(),
        clock.clone(),
        track.duration(),
    ));

    let machine = restore(config, store.clone(), feed.clone()).await?;
    let (machine, transition) =
        blocking(machine, move |machine| machine.handle(Event::Select(station))).await?;
    report(transition);
    let mut app = Some(machine);

    let mut ticks = time::interval(TICK);
    loop {
        ticks.tick().await;
        let now = clock.advance();
        if now > track.duration() {
            break;
        }
        if app.is_some() && args.hide_after.is_some_and(|hide| now >= hide) {
            info!(second = now, "App closed, only the background task is left");
            app = None;
        }
        if let Some(machine) = app.take_if(|machine| machine.feed().is_watching()) {
            let (machine, result) = blocking(machine, Machine::refresh_position).await?;
            match result {
                Ok(transition) => report(transition),
                Err(err) => debug!("No position yet: {err}"),
            }
            app = Some(machine);
        }
    }
    background.await??;

    let machine = match app {
        Some(machine) => machine,
        None => {
            info!("App reopened");
            restore(config, store, feed).await?
        }
    };
    info!(status = ?machine.status(), "Trip finished");
    let (_, transition) = blocking(machine, |machine| machine.handle(Event::Stop)).await?;
    report(transition);
    Ok(())
}

/// Runs `op` on the blocking pool. Every store call is file I/O under an OS
/// lock and must stay off the runtime's worker threads.
async fn blocking<T, R>(
    mut value: T,
    op: impl FnOnce(&mut T) -> R + Send + 'static,
) -> Result<(T, R), Error>
where
    T: Send + 'static,
    R: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(move || {
        let result = op(&mut value);
        (value, result)
    })
    .await?)
}

async fn restore(
    config: Config,
    store: Arc<FileStore>,
    feed: SimulatedFeed,
) -> Result<Machine, Error> {
    let machine = tokio::task::spawn_blocking(move || {
        AlarmMachine::restore(config, store, LogActuator::new("foreground"), feed)
    })
    .await??;
    Ok(machine)
}

/// Stands in for the OS scheduled location task, delivering the positions
/// recorded since the previous run in one batch.
async fn background_loop(
    config: Config,
    store: Arc<FileStore>,
    feed: SimulatedFeed,
    clock: Clock,
    end: u64,
) -> Result<(), Error> {
    let mut task = BackgroundTask::new(config, store, LogActuator::new("background"))?;
    let mut ticks = time::interval(TICK * config.background.min_interval.as_secs().max(1) as u32);
    let mut last = clock.now();
    loop {
        ticks.tick().await;
        let now = clock.now();
        if now > end {
            return Ok(());
        }
        if !feed.is_background_registered() {
            last = now;
            continue;
        }
        let samples = feed.samples_between(last, now);
        last = now;
        let (next, result) = blocking(task, move |task| task.on_locations(&samples)).await?;
        task = next;
        match result {
            Ok(BackgroundOutcome::Fired { distance, .. }) => {
                info!(%distance, "Background task raised the alarm")
            }
            Ok(outcome) => debug!(?outcome, "Background run"),
            Err(err) => warn!("Background run failed, retrying next time: {err}"),
        }
    }
}

fn report(transition: Transition) {
    if transition.changed() {
        info!(from = ?transition.from, to = ?transition.to, "Alarm changed phase");
    }
    for warning in transition.warnings {
        warn!(?warning, "Alarm warning");
    }
}
