//! Encoding of [`AlarmState`] in the store and the claim protocol both
//! contexts use to start an alert.

use tracing::warn;

use crate::{
    stations::Station,
    store::{
        self, Batch, FALSE, IS_PLAYING_KEY, IS_WAITING_KEY, SELECTED_STATION_KEY, Store, TRUE,
    },
};

use super::{AlarmState, Phase};

/// State as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Loaded {
    pub state: AlarmState,
    /// False when the keys contradict each other and were read as Idle.
    pub consistent: bool,
}

pub(crate) fn load<S: Store + ?Sized>(store: &S) -> Result<Loaded, store::Error> {
    let values = store.get_many(&[SELECTED_STATION_KEY, IS_PLAYING_KEY, IS_WAITING_KEY])?;
    Ok(decode(
        values[0].as_deref(),
        values[1].as_deref(),
        values[2].as_deref(),
    ))
}

pub(crate) fn decode(station: Option<&str>, playing: Option<&str>, waiting: Option<&str>) -> Loaded {
    let playing = playing == Some(TRUE);
    if waiting != Some(TRUE) {
        // A leftover selection without the armed flag is simply not armed.
        return Loaded {
            state: AlarmState::idle(),
            consistent: !playing,
        };
    }

    let station = match station.map(serde_json::from_str::<Station>) {
        Some(Ok(station)) => station,
        Some(Err(err)) => {
            warn!("Stored station is unreadable, treating alarm as idle: {err}");
            return Loaded {
                state: AlarmState::idle(),
                consistent: false,
            };
        }
        None => {
            warn!("Alarm is flagged as armed without a station, treating it as idle");
            return Loaded {
                state: AlarmState::idle(),
                consistent: false,
            };
        }
    };

    let state = if playing {
        AlarmState::alarming(station)
    } else {
        AlarmState::armed(station)
    };
    Loaded {
        state,
        consistent: true,
    }
}

/// Writes for arming on `station`, all three keys at once.
pub(crate) fn arm_batch(station: &Station) -> Result<Batch, store::Error> {
    Ok(Batch::new()
        .set(SELECTED_STATION_KEY, serde_json::to_string(station)?)
        .set(IS_PLAYING_KEY, FALSE)
        .set(IS_WAITING_KEY, TRUE))
}

pub(crate) fn disarm_batch() -> Batch {
    Batch::new()
        .remove(SELECTED_STATION_KEY)
        .set(IS_PLAYING_KEY, FALSE)
        .set(IS_WAITING_KEY, FALSE)
}

/// Full rewrite of `state`, used to catch the store up after failed writes.
pub(crate) fn snapshot_batch(state: &AlarmState) -> Result<Batch, store::Error> {
    match (&state.station, state.phase) {
        (Some(station), Phase::Armed | Phase::Alarming) => Ok(arm_batch(station)?
            .set(IS_PLAYING_KEY, store::flag(state.phase == Phase::Alarming))),
        _ => Ok(disarm_batch()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Claim {
    /// This caller owns the alert for the current arming episode.
    Claimed,
    /// Another context got there first.
    AlreadyFired,
    /// The alarm was disarmed underneath us, the claim was rolled back.
    Disarmed,
    /// The alarm was re-armed after the caller read it, the decision no
    /// longer applies.
    Superseded,
}

/// Claims the right to start the alert for `station`.
///
/// The swap is the linearization point: of any number of concurrent callers
/// exactly one observes the previous value as not `"true"`. The winner then
/// re-reads the episode. Arming always resets `isPlayingAlarm`, so a flag that
/// is no longer `"true"` means someone re-armed after the swap and the flag
/// belongs to that new episode. A different station with the flag still set
/// means the re-arm landed before the swap, which then took the new episode's
/// flag and has to give it back.
pub(crate) fn claim_alarm<S: Store + ?Sized>(
    store: &S,
    station: &Station,
) -> Result<Claim, store::Error> {
    if store.swap(IS_PLAYING_KEY, TRUE)?.as_deref() == Some(TRUE) {
        return Ok(Claim::AlreadyFired);
    }
    let values = store.get_many(&[SELECTED_STATION_KEY, IS_PLAYING_KEY, IS_WAITING_KEY])?;
    if values[2].as_deref() != Some(TRUE) {
        store.set(IS_PLAYING_KEY, FALSE)?;
        return Ok(Claim::Disarmed);
    }
    if values[1].as_deref() != Some(TRUE) {
        warn!("Alarm for {} was re-armed while claiming it", station.name);
        return Ok(Claim::Superseded);
    }
    let same_station = values[0]
        .as_deref()
        .and_then(|json| serde_json::from_str::<Station>(json).ok())
        .is_some_and(|current| current.id == station.id);
    if !same_station {
        warn!("Alarm moved away from {} before it was claimed", station.name);
        store.set(IS_PLAYING_KEY, FALSE)?;
        return Ok(Claim::Superseded);
    }
    Ok(Claim::Claimed)
}
