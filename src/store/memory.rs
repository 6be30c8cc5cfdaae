use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use super::{Batch, Error, Store};

/// Process-local store. Shares state between contexts living in one process,
/// nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, Error> {
        self.entries
            .lock()
            .map_err(|err| Error::Unavailable(err.to_string()))
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, Error> {
        let entries = self.lock()?;
        Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
    }

    fn write_batch(&self, batch: Batch) -> Result<(), Error> {
        let mut entries = self.lock()?;
        batch.apply_to(&mut *entries);
        Ok(())
    }

    fn swap(&self, key: &str, value: &str) -> Result<Option<String>, Error> {
        Ok(self.lock()?.insert(key.to_string(), value.to_string()))
    }
}

#[test]
fn memory_swap_returns_previous() {
    let store = MemoryStore::new();
    assert_eq!(store.swap("isPlayingAlarm", "true").unwrap(), None);
    assert_eq!(
        store.swap("isPlayingAlarm", "true").unwrap().as_deref(),
        Some("true")
    );
}
