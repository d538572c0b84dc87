//! Whole-list alarm persistence.
//!
//! The full alarm list is stored as one JSON array under [`ALARMS_KEY`].
//! Every save overwrites the previous array; there is no partial update.

use std::sync::Arc;

use tracing::debug;

use super::kv::KeyValueStore;
use crate::alarm::Alarm;
use crate::error::Result;

pub const ALARMS_KEY: &str = "alarms";
pub const DAILY_RESET_ENABLED_KEY: &str = "daily_reset_enabled";

#[derive(Clone)]
pub struct AlarmStore {
    kv: Arc<dyn KeyValueStore>,
}

impl AlarmStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Load every stored alarm. A store that was never written yields an
    /// empty list.
    pub fn load_all(&self) -> Result<Vec<Alarm>> {
        match self.kv.get(ALARMS_KEY)? {
            Some(json) => {
                let alarms: Vec<Alarm> = serde_json::from_str(&json)?;
                debug!(count = alarms.len(), "loaded alarms");
                Ok(alarms)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Overwrite the stored list with `alarms`.
    pub fn save_all(&self, alarms: &[Alarm]) -> Result<()> {
        let json = serde_json::to_string(alarms)?;
        self.kv.put(ALARMS_KEY, &json)?;
        debug!(count = alarms.len(), "saved alarms");
        Ok(())
    }

    /// Whether the daily reset wake request should be kept armed.
    /// Defaults to `false` until set.
    pub fn daily_reset_enabled(&self) -> Result<bool> {
        Ok(self
            .kv
            .get(DAILY_RESET_ENABLED_KEY)?
            .is_some_and(|value| value == "true"))
    }

    pub fn set_daily_reset_enabled(&self, enabled: bool) -> Result<()> {
        self.kv
            .put(DAILY_RESET_ENABLED_KEY, if enabled { "true" } else { "false" })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{SoundRef, VibrationPattern};
    use crate::storage::MemoryKv;
    use chrono::{TimeZone, Utc};

    fn alarm(id: u32, hour: u8) -> Alarm {
        Alarm {
            id,
            hour,
            minute: 15,
            label: format!("alarm {id}"),
            is_enabled: id % 2 == 1,
            next_trigger_at: Utc.with_ymd_and_hms(2024, 6, 1, u32::from(hour), 15, 0).unwrap(),
            is_daily_reset: false,
            max_snooze_count: 3,
            current_snooze_count: 0,
            vibration_pattern: VibrationPattern::Short,
            snooze_interval_ms: 60_000,
            work_duration_ms: 300_000,
            break_duration_ms: 120_000,
            sound: SoundRef::Uri("tone://chime".into()),
        }
    }

    #[test]
    fn missing_key_loads_empty() {
        let store = AlarmStore::new(Arc::new(MemoryKv::new()));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn save_overwrites_whole_list() {
        let store = AlarmStore::new(Arc::new(MemoryKv::new()));
        store.save_all(&[alarm(1, 6), alarm(2, 7)]).unwrap();
        store.save_all(&[alarm(3, 8)]).unwrap();
        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, 3);
    }

    #[test]
    fn saving_a_loaded_list_is_a_fixed_point() {
        let kv = Arc::new(MemoryKv::new());
        let store = AlarmStore::new(kv.clone());
        store.save_all(&[alarm(1, 6), alarm(2, 7)]).unwrap();
        let before = kv.get(ALARMS_KEY).unwrap();

        let loaded = store.load_all().unwrap();
        store.save_all(&loaded).unwrap();

        assert_eq!(kv.get(ALARMS_KEY).unwrap(), before);
    }

    #[test]
    fn daily_reset_flag_defaults_off() {
        let store = AlarmStore::new(Arc::new(MemoryKv::new()));
        assert!(!store.daily_reset_enabled().unwrap());
        store.set_daily_reset_enabled(true).unwrap();
        assert!(store.daily_reset_enabled().unwrap());
        store.set_daily_reset_enabled(false).unwrap();
        assert!(!store.daily_reset_enabled().unwrap());
    }

    #[test]
    fn corrupt_blob_is_an_error() {
        let kv = Arc::new(MemoryKv::new());
        kv.put(ALARMS_KEY, "not json").unwrap();
        let store = AlarmStore::new(kv);
        assert!(store.load_all().is_err());
    }
}
