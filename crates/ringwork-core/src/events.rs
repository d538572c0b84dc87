use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alarm::{AlarmId, SoundRef, VibrationPattern};

/// Every ringing transition and wake dispatch produces an Event.
/// The daemon prints them; tests assert on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    RingingStarted {
        alarm_id: AlarmId,
        label: String,
        vibration: VibrationPattern,
        sound: SoundRef,
        at: DateTime<Utc>,
    },
    /// `next_trigger_at` is set when a daily-reset alarm was re-armed for
    /// tomorrow.
    Dismissed {
        alarm_id: AlarmId,
        next_trigger_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
    /// A snooze was granted and the alarm re-armed. `automatic` marks the
    /// auto-snooze that follows an unanswered ringing session.
    Snoozed {
        alarm_id: AlarmId,
        snooze_count: u32,
        rearm_at: DateTime<Utc>,
        automatic: bool,
        at: DateTime<Utc>,
    },
    /// Snooze budget exhausted; the alarm is now disabled.
    SnoozeExhausted {
        alarm_id: AlarmId,
        automatic: bool,
        at: DateTime<Utc>,
    },
    DailyResetFired {
        rearmed: usize,
        next_reset_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// A wake event carried the invalid sentinel id and was discarded.
    WakeDropped {
        alarm_id: AlarmId,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Alarm the event concerns, if any.
    pub fn alarm_id(&self) -> Option<AlarmId> {
        match self {
            Event::RingingStarted { alarm_id, .. }
            | Event::Dismissed { alarm_id, .. }
            | Event::Snoozed { alarm_id, .. }
            | Event::SnoozeExhausted { alarm_id, .. } => Some(*alarm_id),
            Event::DailyResetFired { .. } | Event::WakeDropped { .. } => None,
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::RingingStarted { at, .. }
            | Event::Dismissed { at, .. }
            | Event::Snoozed { at, .. }
            | Event::SnoozeExhausted { at, .. }
            | Event::DailyResetFired { at, .. }
            | Event::WakeDropped { at, .. } => *at,
        }
    }
}
