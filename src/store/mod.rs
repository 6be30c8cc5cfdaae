//! Durable key/value state shared by the foreground process and the
//! background location task.
//!
//! Both contexts talk to the store and nothing else, so it is the single
//! arbitration point for alarm decisions. Multi-key updates go through a
//! [`Batch`] which every backend applies atomically, and [`Store::swap`] is the
//! one read-modify-write primitive used to claim an alarm.

use std::{collections::HashMap, io, sync::Arc};

use thiserror::Error;

mod file;
mod memory;
pub use file::FileStore;
pub use memory::MemoryStore;

pub const SELECTED_STATION_KEY: &str = "selectedStation";
pub const IS_PLAYING_KEY: &str = "isPlayingAlarm";
pub const IS_WAITING_KEY: &str = "isWaitingAlarm";
pub const SOUND_ENABLED_KEY: &str = "app_sound";
pub const VIBRATION_ENABLED_KEY: &str = "app_vibration";

pub const TRUE: &str = "true";
pub const FALSE: &str = "false";

/// Encodes a flag the way it is stored on disk.
pub const fn flag(value: bool) -> &'static str {
    if value { TRUE } else { FALSE }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Store is unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Set(String, String),
    Remove(String),
}

/// A group of writes that must become visible together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    writes: Vec<Write>,
}

impl Batch {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.writes.push(Write::Set(key.into(), value.into()));
        self
    }

    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.writes.push(Write::Remove(key.into()));
        self
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Applies the writes in order, later writes to a key win.
    pub(crate) fn apply_to<M>(self, entries: &mut M)
    where
        M: Entries,
    {
        for write in self.writes {
            match write {
                Write::Set(key, value) => entries.put(key, value),
                Write::Remove(key) => entries.delete(&key),
            }
        }
    }
}

/// Minimal map surface a [`Batch`] is applied to.
pub(crate) trait Entries {
    fn put(&mut self, key: String, value: String);
    fn delete(&mut self, key: &str);
}

impl Entries for HashMap<String, String> {
    fn put(&mut self, key: String, value: String) {
        self.insert(key, value);
    }

    fn delete(&mut self, key: &str) {
        self.remove(key);
    }
}

impl Entries for std::collections::BTreeMap<String, String> {
    fn put(&mut self, key: String, value: String) {
        self.insert(key, value);
    }

    fn delete(&mut self, key: &str) {
        self.remove(key);
    }
}

pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Reads several keys from one consistent snapshot.
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, Error>;

    /// Applies every write in the batch or none of them.
    fn write_batch(&self, batch: Batch) -> Result<(), Error>;

    /// Atomically stores `value` and returns what was there before.
    fn swap(&self, key: &str, value: &str) -> Result<Option<String>, Error>;

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.write_batch(Batch::new().set(key, value))
    }

    fn multi_set(&self, entries: &[(&str, &str)]) -> Result<(), Error> {
        let batch = entries
            .iter()
            .fold(Batch::new(), |batch, (key, value)| batch.set(*key, *value));
        self.write_batch(batch)
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.write_batch(Batch::new().remove(key))
    }
}

impl<T> Store for Arc<T>
where
    T: Store + ?Sized,
{
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        (**self).get(key)
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, Error> {
        (**self).get_many(keys)
    }

    fn write_batch(&self, batch: Batch) -> Result<(), Error> {
        (**self).write_batch(batch)
    }

    fn swap(&self, key: &str, value: &str) -> Result<Option<String>, Error> {
        (**self).swap(key, value)
    }
}

#[test]
fn batch_later_write_wins() {
    let mut entries: HashMap<String, String> = HashMap::new();
    Batch::new()
        .set("a", "1")
        .set("b", "2")
        .remove("a")
        .set("b", "3")
        .apply_to(&mut entries);
    assert_eq!(entries.get("a"), None);
    assert_eq!(entries.get("b").map(String::as_str), Some("3"));
}
