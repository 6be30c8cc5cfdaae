use tracing::{error, info, warn};

use crate::{
    actuator::{self, AlertActuator, AlertReport, Modality, ModalityOutcome},
    settings::Settings,
};

/// Presents the alert on every enabled modality. The notification is always
/// shown since it carries the stop action.
pub(crate) fn start<A>(actuator: &mut A, station_name: &str, settings: &Settings) -> AlertReport
where
    A: AlertActuator + ?Sized,
{
    if let Err(err) = actuator.dismiss_notifications() {
        warn!("Could not clear previous alerts: {err}");
    }
    let mut report = AlertReport {
        notification: actuator.show_notification(station_name).into(),
        ..Default::default()
    };
    if settings.sound_enabled {
        report.sound = actuator.start_sound().into();
    }
    if settings.vibration_enabled {
        report.vibration = actuator.start_vibration().into();
    }

    for (modality, outcome) in report.outcomes() {
        if let ModalityOutcome::Failed(err) = outcome {
            warn!(%modality, "Alert modality failed to start: {err}");
        }
    }
    if report.all_failed() {
        error!("No alert modality could be started for {station_name}");
    } else {
        info!("Alert started for {station_name}");
    }
    report
}

/// Silences every modality and clears the notification. Stops are attempted
/// even when the modality was never started.
pub(crate) fn stop<A>(actuator: &mut A) -> Vec<actuator::Error>
where
    A: AlertActuator + ?Sized,
{
    let results = [
        (Modality::Sound, actuator.stop_sound()),
        (Modality::Vibration, actuator.stop_vibration()),
        (Modality::Notification, actuator.dismiss_notifications()),
    ];
    results
        .into_iter()
        .filter_map(|(modality, result)| {
            let err = result.err()?;
            warn!(%modality, "Alert modality failed to stop: {err}");
            Some(err)
        })
        .collect()
}
