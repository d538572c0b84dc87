use tracing::info;

use crate::alarm::{Alarm, AlarmId};

/// Whatever plays sound and vibration and shows dismiss/snooze controls.
///
/// User actions come back into the engine through
/// [`RingingSessionController::dismiss`](super::RingingSessionController::dismiss)
/// and [`snooze`](super::RingingSessionController::snooze).
pub trait PresentationSink: Send + Sync {
    /// Start presenting. The alarm carries the label, vibration pattern and
    /// sound to use.
    fn begin_ringing(&self, alarm: &Alarm);

    /// Stop all playback for the session.
    fn end_ringing(&self, alarm_id: AlarmId);

    /// Tell the user the snooze budget is spent.
    fn snooze_exhausted(&self, alarm_id: AlarmId);
}

/// Sink that only writes log lines. Used by the daemon, which has no
/// speaker of its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl PresentationSink for LogSink {
    fn begin_ringing(&self, alarm: &Alarm) {
        info!(
            alarm_id = alarm.id,
            label = %alarm.label,
            vibration = %alarm.vibration_pattern,
            sound = %alarm.sound,
            "ringing"
        );
    }

    fn end_ringing(&self, alarm_id: AlarmId) {
        info!(alarm_id, "ringing stopped");
    }

    fn snooze_exhausted(&self, alarm_id: AlarmId) {
        info!(alarm_id, "Max snooze reached");
    }
}
