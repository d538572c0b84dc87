use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::{WakePayload, WakeRequest, WakeTimer};
use crate::alarm::AlarmId;
use crate::error::Result;

/// Wake timer that only records what is pending. Nothing ever fires.
///
/// Used by one-shot commands, which arm and exit, and by tests that assert
/// on the armed set.
#[derive(Debug, Default)]
pub struct MemoryWakeTimer {
    pending: Mutex<BTreeMap<AlarmId, WakeRequest>>,
}

impl MemoryWakeTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending requests ordered by id.
    pub fn pending(&self) -> Vec<WakeRequest> {
        self.entries().values().cloned().collect()
    }

    pub fn get(&self, alarm_id: AlarmId) -> Option<WakeRequest> {
        self.entries().get(&alarm_id).cloned()
    }

    pub fn is_armed(&self, alarm_id: AlarmId) -> bool {
        self.entries().contains_key(&alarm_id)
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<AlarmId, WakeRequest>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl WakeTimer for MemoryWakeTimer {
    fn schedule(&self, alarm_id: AlarmId, at: DateTime<Utc>, payload: WakePayload) -> Result<()> {
        self.entries().insert(
            alarm_id,
            WakeRequest {
                alarm_id,
                at,
                label: payload.label,
            },
        );
        Ok(())
    }

    fn cancel(&self, alarm_id: AlarmId) -> Result<()> {
        self.entries().remove(&alarm_id);
        Ok(())
    }
}
