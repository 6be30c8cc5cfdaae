use std::fmt::Display;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{0} is not available on this device")]
    Unsupported(Modality),
    #[error("{modality} failed: {reason}")]
    Failed { modality: Modality, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    Sound,
    Vibration,
    Notification,
}

impl Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Modality::Sound => "sound",
            Modality::Vibration => "vibration",
            Modality::Notification => "notification",
        };
        f.write_str(name)
    }
}

/// Platform alert capability. Each modality is driven on its own so a failure
/// in one never blocks the others.
pub trait AlertActuator {
    /// Shows a persistent alert for the station carrying a "stop" action.
    fn show_notification(&mut self, station_name: &str) -> Result<(), Error>;

    fn dismiss_notifications(&mut self) -> Result<(), Error>;

    /// Starts the looping alert sound.
    fn start_sound(&mut self) -> Result<(), Error>;

    fn stop_sound(&mut self) -> Result<(), Error>;

    fn start_vibration(&mut self) -> Result<(), Error>;

    fn stop_vibration(&mut self) -> Result<(), Error>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModalityOutcome {
    Started,
    /// Turned off in the alert settings.
    #[default]
    Skipped,
    Failed(Error),
}

impl ModalityOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, ModalityOutcome::Started)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ModalityOutcome::Failed(_))
    }
}

impl From<Result<(), Error>> for ModalityOutcome {
    fn from(value: Result<(), Error>) -> Self {
        match value {
            Ok(()) => Self::Started,
            Err(err) => Self::Failed(err),
        }
    }
}

/// What happened to each modality when an alert was started.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlertReport {
    pub notification: ModalityOutcome,
    pub sound: ModalityOutcome,
    pub vibration: ModalityOutcome,
}

impl AlertReport {
    pub fn outcomes(&self) -> [(Modality, &ModalityOutcome); 3] {
        [
            (Modality::Notification, &self.notification),
            (Modality::Sound, &self.sound),
            (Modality::Vibration, &self.vibration),
        ]
    }

    pub fn any_started(&self) -> bool {
        self.outcomes().iter().any(|(_, outcome)| outcome.is_started())
    }

    /// True when something was attempted and nothing reached the user.
    pub fn all_failed(&self) -> bool {
        !self.any_started() && self.outcomes().iter().any(|(_, outcome)| outcome.is_failed())
    }
}

#[test]
fn report_all_failed_ignores_skipped() {
    let failed = |modality| {
        ModalityOutcome::Failed(Error::Failed {
            modality,
            reason: "busy".into(),
        })
    };
    let report = AlertReport {
        notification: failed(Modality::Notification),
        sound: ModalityOutcome::Skipped,
        vibration: failed(Modality::Vibration),
    };
    assert!(report.all_failed());

    let report = AlertReport {
        sound: ModalityOutcome::Started,
        ..report
    };
    assert!(!report.all_failed());
    assert!(report.any_started());
}
