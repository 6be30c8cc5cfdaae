use crate::store::{self, SOUND_ENABLED_KEY, Store, VIBRATION_ENABLED_KEY, flag};

/// User alert preferences. Anything other than a stored `"false"` counts as
/// enabled so a fresh install alerts with every modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub sound_enabled: bool,
    pub vibration_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            vibration_enabled: true,
        }
    }
}

impl Settings {
    pub fn load<S: Store + ?Sized>(store: &S) -> Result<Self, store::Error> {
        let values = store.get_many(&[SOUND_ENABLED_KEY, VIBRATION_ENABLED_KEY])?;
        let enabled = |value: &Option<String>| value.as_deref() != Some(store::FALSE);
        Ok(Self {
            sound_enabled: enabled(&values[0]),
            vibration_enabled: enabled(&values[1]),
        })
    }

    pub fn save<S: Store + ?Sized>(&self, store: &S) -> Result<(), store::Error> {
        store.multi_set(&[
            (SOUND_ENABLED_KEY, flag(self.sound_enabled)),
            (VIBRATION_ENABLED_KEY, flag(self.vibration_enabled)),
        ])
    }
}
