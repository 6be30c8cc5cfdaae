mod common;

use std::{
    env, fs,
    path::PathBuf,
    sync::{
        Arc, Barrier,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

use common::*;
use nearstop::{
    alarm::{AlarmMachine, BackgroundOutcome, BackgroundTask, Config, Event, Phase},
    settings::Settings,
    store::{Batch, FileStore, IS_PLAYING_KEY, IS_WAITING_KEY, SELECTED_STATION_KEY, Store},
};
use pretty_assertions::assert_eq;

static NEXT: AtomicUsize = AtomicUsize::new(0);

/// Unique store path under the temp dir, removed on drop.
struct TempPath(PathBuf);

impl TempPath {
    fn new() -> Self {
        let n = NEXT.fetch_add(1, Ordering::SeqCst);
        Self(
            env::temp_dir()
                .join(format!("nearstop-{}", std::process::id()))
                .join(format!("store-{n}.json")),
        )
    }
}

impl Drop for TempPath {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
        let mut lock = self.0.clone().into_os_string();
        lock.push(".lock");
        let _ = fs::remove_file(lock);
    }
}

#[test]
fn missing_file_reads_empty() {
    let path = TempPath::new();
    let store = FileStore::open(&path.0).unwrap();
    assert_eq!(store.get(IS_WAITING_KEY).unwrap(), None);
    assert_eq!(
        store.get_many(&[IS_WAITING_KEY, IS_PLAYING_KEY]).unwrap(),
        vec![None, None]
    );
    assert_eq!(Settings::load(&store).unwrap(), Settings::default());
}

#[test]
fn batch_applies_in_order() {
    let path = TempPath::new();
    let store = FileStore::open(&path.0).unwrap();
    store
        .write_batch(
            Batch::new()
                .set("a", "1")
                .set("b", "2")
                .remove("a")
                .set("b", "3"),
        )
        .unwrap();
    assert_eq!(
        store.get_many(&["a", "b"]).unwrap(),
        vec![None, Some("3".to_string())]
    );
}

#[test]
fn survives_reopen() {
    let path = TempPath::new();
    {
        let store = FileStore::open(&path.0).unwrap();
        store
            .multi_set(&[(IS_WAITING_KEY, "true"), (IS_PLAYING_KEY, "false")])
            .unwrap();
    }
    let store = FileStore::open(&path.0).unwrap();
    assert_eq!(store.get(IS_WAITING_KEY).unwrap().as_deref(), Some("true"));
    store.remove(IS_WAITING_KEY).unwrap();
    assert_eq!(store.get(IS_WAITING_KEY).unwrap(), None);
}

#[test]
fn swap_returns_previous_value() {
    let path = TempPath::new();
    let store = FileStore::open(&path.0).unwrap();
    assert_eq!(store.swap(IS_PLAYING_KEY, "false").unwrap(), None);
    assert_eq!(
        store.swap(IS_PLAYING_KEY, "true").unwrap().as_deref(),
        Some("false")
    );
    assert_eq!(
        store.swap(IS_PLAYING_KEY, "true").unwrap().as_deref(),
        Some("true")
    );
}

#[test]
fn concurrent_swaps_claim_once() {
    let path = TempPath::new();
    let store = Arc::new(FileStore::open(&path.0).unwrap());
    store.set(IS_PLAYING_KEY, "false").unwrap();

    let claimed = thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let store = store.clone();
                scope.spawn(move || store.swap(IS_PLAYING_KEY, "true").unwrap())
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|previous| previous.as_deref() != Some("true"))
            .count()
    });
    assert_eq!(claimed, 1);
}

#[test]
fn separate_handles_claim_once() {
    const HANDLES: usize = 4;

    for _ in 0..30 {
        let path = TempPath::new();
        FileStore::open(&path.0)
            .unwrap()
            .set(IS_PLAYING_KEY, "false")
            .unwrap();
        let barrier = Barrier::new(HANDLES);

        let claimed = thread::scope(|scope| {
            let handles: Vec<_> = (0..HANDLES)
                .map(|_| {
                    let store = FileStore::open(&path.0).unwrap();
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        store.swap(IS_PLAYING_KEY, "true").unwrap()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|previous| previous.as_deref() != Some("true"))
                .count()
        });
        assert_eq!(claimed, 1);
    }
}

#[test]
fn separate_handles_keep_every_write() {
    let path = TempPath::new();

    thread::scope(|scope| {
        for n in 0..8 {
            let store = FileStore::open(&path.0).unwrap();
            scope.spawn(move || store.set(&format!("key-{n}"), "1").unwrap());
        }
    });

    let store = FileStore::open(&path.0).unwrap();
    let keys: Vec<String> = (0..8).map(|n| format!("key-{n}")).collect();
    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
    assert!(store.get_many(&keys).unwrap().iter().all(Option::is_some));
}

#[test]
fn empty_file_reads_empty() {
    let path = TempPath::new();
    let store = FileStore::open(&path.0).unwrap();
    fs::write(store.path(), "").unwrap();
    assert_eq!(store.get(IS_WAITING_KEY).unwrap(), None);
}

#[test]
fn corrupt_file_is_an_error() {
    let path = TempPath::new();
    let store = FileStore::open(&path.0).unwrap();
    fs::write(store.path(), "{ not json").unwrap();
    assert!(store.get(IS_WAITING_KEY).is_err());
}

#[test]
fn alarm_resumes_after_restart() {
    let path = TempPath::new();
    {
        let mut machine = AlarmMachine::restore(
            Config::default(),
            FileStore::open(&path.0).unwrap(),
            RecordingActuator::new(),
            ScriptedFeed::new(),
        )
        .unwrap();
        machine.handle(Event::Select(kurskaya()));
        machine.handle(Event::Sample(sample_north_of(&kurskaya(), 2.0)));
    }

    let feed = ScriptedFeed::new();
    let machine = AlarmMachine::restore(
        Config::default(),
        FileStore::open(&path.0).unwrap(),
        RecordingActuator::new(),
        feed.clone(),
    )
    .unwrap();
    assert_eq!(machine.phase(), Phase::Armed);
    assert_eq!(machine.state().station, Some(kurskaya()));
    assert!(feed.state().watching);
}

#[test]
fn two_handles_share_state() {
    let path = TempPath::new();
    let foreground_store = Arc::new(FileStore::open(&path.0).unwrap());
    let background_store = Arc::new(FileStore::open(&path.0).unwrap());

    let mut machine = AlarmMachine::restore(
        Config::default(),
        foreground_store.clone(),
        RecordingActuator::new(),
        ScriptedFeed::new(),
    )
    .unwrap();
    machine.handle(Event::Select(kurskaya()));

    let mut task =
        BackgroundTask::new(Config::default(), background_store.clone(), RecordingActuator::new())
            .unwrap();
    let outcome = task.on_locations(&[sample_north_of(&kurskaya(), 0.4)]).unwrap();
    assert!(matches!(outcome, BackgroundOutcome::Fired { .. }));
    assert_eq!(
        foreground_store.get(IS_PLAYING_KEY).unwrap().as_deref(),
        Some("true")
    );

    machine.handle(Event::Stop);
    assert_eq!(background_store.get(SELECTED_STATION_KEY).unwrap(), None);
    assert_eq!(
        task.on_locations(&[sample_north_of(&kurskaya(), 0.4)]).unwrap(),
        BackgroundOutcome::Idle
    );
}
