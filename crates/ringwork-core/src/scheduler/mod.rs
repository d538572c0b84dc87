//! Wake scheduling.
//!
//! [`WakeTimer`] is the seam to whatever fires callbacks at absolute
//! instants. [`WakeScheduler`] is the only thing in the engine that talks to
//! it; it keeps no state of its own.

mod memory;
mod tokio_timer;

pub use memory::MemoryWakeTimer;
pub use tokio_timer::{TokioWakeTimer, WakeEvent};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::alarm::{is_reserved, Alarm, AlarmId, DAILY_RESET_ALARM_ID};
use crate::clock::Clock;
use crate::error::{Result, ValidationError};

/// Data delivered back with a wake event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakePayload {
    pub label: String,
}

/// Absolute wake-up timer collaborator.
///
/// Scheduling an id that already has a pending request replaces it.
/// Cancelling an id with nothing pending succeeds.
pub trait WakeTimer: Send + Sync {
    fn schedule(&self, alarm_id: AlarmId, at: DateTime<Utc>, payload: WakePayload) -> Result<()>;

    fn cancel(&self, alarm_id: AlarmId) -> Result<()>;
}

/// One `(id, instant, label)` tuple to arm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeRequest {
    pub alarm_id: AlarmId,
    pub at: DateTime<Utc>,
    pub label: String,
}

impl WakeRequest {
    /// Request for the alarm's stored trigger instant.
    pub fn for_alarm(alarm: &Alarm) -> Self {
        Self {
            alarm_id: alarm.id,
            at: alarm.next_trigger_at,
            label: alarm.label.clone(),
        }
    }
}

#[derive(Clone)]
pub struct WakeScheduler {
    timer: Arc<dyn WakeTimer>,
}

impl WakeScheduler {
    pub fn new(timer: Arc<dyn WakeTimer>) -> Self {
        Self { timer }
    }

    /// Arm a wake event for a user alarm, replacing any pending one.
    pub fn arm(&self, request: &WakeRequest) -> Result<()> {
        if is_reserved(request.alarm_id) {
            return Err(ValidationError::ReservedId(request.alarm_id).into());
        }
        debug!(alarm_id = request.alarm_id, at = %request.at, "arming wake event");
        self.timer.schedule(
            request.alarm_id,
            request.at,
            WakePayload {
                label: request.label.clone(),
            },
        )
    }

    pub fn arm_all(&self, requests: &[WakeRequest]) -> Result<()> {
        for request in requests {
            self.arm(request)?;
        }
        Ok(())
    }

    pub fn disarm(&self, alarm_id: AlarmId) -> Result<()> {
        debug!(alarm_id, "disarming wake event");
        self.timer.cancel(alarm_id)
    }

    /// Arm the daily reset for the clock's next local midnight. Returns the
    /// instant armed.
    pub fn arm_daily_reset(&self, clock: &dyn Clock) -> Result<DateTime<Utc>> {
        let at = clock.next_trigger(0, 0);
        self.timer.schedule(
            DAILY_RESET_ALARM_ID,
            at,
            WakePayload {
                label: "daily reset".into(),
            },
        )?;
        info!(%at, "daily reset armed");
        Ok(at)
    }

    pub fn disarm_daily_reset(&self) -> Result<()> {
        info!("daily reset disarmed");
        self.timer.cancel(DAILY_RESET_ALARM_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::INVALID_ALARM_ID;
    use crate::clock::ManualClock;
    use crate::error::CoreError;
    use chrono::{FixedOffset, TimeZone};

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, m, 0).unwrap()
    }

    fn request(alarm_id: AlarmId, at: DateTime<Utc>) -> WakeRequest {
        WakeRequest {
            alarm_id,
            at,
            label: format!("#{alarm_id}"),
        }
    }

    #[test]
    fn rearming_replaces_pending_request() {
        let timer = Arc::new(MemoryWakeTimer::new());
        let scheduler = WakeScheduler::new(timer.clone());
        scheduler.arm(&request(3, utc(7, 0))).unwrap();
        scheduler.arm(&request(3, utc(7, 5))).unwrap();
        assert_eq!(timer.pending(), vec![request(3, utc(7, 5))]);
    }

    #[test]
    fn disarm_without_pending_is_ok() {
        let timer = Arc::new(MemoryWakeTimer::new());
        let scheduler = WakeScheduler::new(timer.clone());
        scheduler.disarm(12).unwrap();
        scheduler.arm(&request(12, utc(9, 0))).unwrap();
        scheduler.disarm(12).unwrap();
        scheduler.disarm(12).unwrap();
        assert!(timer.pending().is_empty());
    }

    #[test]
    fn reserved_ids_cannot_be_armed_as_alarms() {
        let scheduler = WakeScheduler::new(Arc::new(MemoryWakeTimer::new()));
        for id in [INVALID_ALARM_ID, DAILY_RESET_ALARM_ID] {
            assert!(matches!(
                scheduler.arm(&request(id, utc(7, 0))),
                Err(CoreError::Validation(ValidationError::ReservedId(_)))
            ));
        }
    }

    #[test]
    fn daily_reset_targets_next_local_midnight() {
        let timer = Arc::new(MemoryWakeTimer::new());
        let scheduler = WakeScheduler::new(timer.clone());
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let clock = ManualClock::new(tz.with_ymd_and_hms(2024, 3, 10, 23, 30, 0).unwrap());

        let at = scheduler.arm_daily_reset(&clock).unwrap();

        assert_eq!(at, Utc.with_ymd_and_hms(2024, 3, 10, 22, 0, 0).unwrap());
        assert!(timer.is_armed(DAILY_RESET_ALARM_ID));
        scheduler.disarm_daily_reset().unwrap();
        assert!(!timer.is_armed(DAILY_RESET_ALARM_ID));
    }
}
