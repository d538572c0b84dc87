//! Authoritative in-memory view of all alarms.
//!
//! Every mutation runs against a working copy of the list. The copy is
//! written through the [`AlarmStore`] and only replaces the in-memory list
//! once that write succeeds, so a failed save leaves the registry exactly as
//! it was. The lock is held across the write, which also serializes saves.
//!
//! Operations that target an id report a missing alarm through their return
//! value (`false`, `None`, [`SnoozeOutcome::NotFound`]) and do not persist.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::alarm::{self, allocate_id, Alarm, AlarmDraft, AlarmId};
use crate::clock::Clock;
use crate::error::Result;
use crate::scheduler::WakeRequest;
use crate::storage::AlarmStore;

/// Result of [`AlarmRegistry::handle_snooze`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SnoozeOutcome {
    /// Snooze counted; the alarm should ring again later.
    Granted { snooze_count: u32 },
    /// Budget used up; the alarm has been disabled.
    Exhausted,
    NotFound,
}

impl SnoozeOutcome {
    pub fn is_granted(self) -> bool {
        matches!(self, SnoozeOutcome::Granted { .. })
    }
}

struct RegistryState {
    alarms: Vec<Alarm>,
    /// Largest id handed out by this process.
    high_water: AlarmId,
}

pub struct AlarmRegistry {
    store: AlarmStore,
    clock: Arc<dyn Clock>,
    state: Mutex<RegistryState>,
}

impl AlarmRegistry {
    /// Load the stored alarms and build the registry around them.
    pub fn open(store: AlarmStore, clock: Arc<dyn Clock>) -> Result<Self> {
        let alarms = store.load_all()?;
        info!(count = alarms.len(), "alarm registry opened");
        Ok(Self {
            store,
            clock,
            state: Mutex::new(RegistryState {
                alarms,
                high_water: 0,
            }),
        })
    }

    pub fn store(&self) -> &AlarmStore {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_trigger(&self, hour: u8, minute: u8) -> DateTime<Utc> {
        let at = self.clock.next_trigger(hour, minute);
        debug!(hour, minute, %at, "computed trigger instant");
        at
    }

    /// Snapshot of every alarm, in creation order.
    pub fn list_all(&self) -> Vec<Alarm> {
        self.state().alarms.clone()
    }

    pub fn get(&self, id: AlarmId) -> Option<Alarm> {
        self.state().alarms.iter().find(|a| a.id == id).cloned()
    }

    /// Run `f` against the full list and persist the result.
    ///
    /// The in-memory list is replaced only after the save succeeds.
    pub fn with_alarms<T>(&self, f: impl FnOnce(&mut Vec<Alarm>) -> T) -> Result<T> {
        let mut state = self.state();
        let mut working = state.alarms.clone();
        let out = f(&mut working);
        self.store.save_all(&working)?;
        state.alarms = working;
        Ok(out)
    }

    /// Like [`with_alarms`](Self::with_alarms) for a single alarm. Returns
    /// `None` without touching the store when `id` is absent.
    fn with_alarm<T>(&self, id: AlarmId, f: impl FnOnce(&mut Alarm) -> T) -> Result<Option<T>> {
        let mut state = self.state();
        let Some(index) = state.alarms.iter().position(|a| a.id == id) else {
            debug!(alarm_id = id, "alarm not found");
            return Ok(None);
        };
        let mut working = state.alarms.clone();
        let out = f(&mut working[index]);
        self.store.save_all(&working)?;
        state.alarms = working;
        Ok(Some(out))
    }

    /// Create, persist, and return a new enabled alarm.
    pub fn create(&self, draft: AlarmDraft) -> Result<Alarm> {
        draft.validate()?;
        let next_trigger_at = self.next_trigger(draft.hour, draft.minute);

        let mut state = self.state();
        let id = allocate_id(state.alarms.iter().map(|a| a.id), state.high_water)?;
        let alarm = Alarm {
            id,
            hour: draft.hour,
            minute: draft.minute,
            label: draft.label,
            is_enabled: true,
            next_trigger_at,
            is_daily_reset: draft.daily_reset,
            max_snooze_count: draft.max_snooze_count,
            current_snooze_count: 0,
            vibration_pattern: draft.vibration,
            snooze_interval_ms: draft.snooze_interval_ms,
            work_duration_ms: draft.work_duration_ms,
            break_duration_ms: draft.break_duration_ms,
            sound: draft.sound,
        };

        let mut working = state.alarms.clone();
        working.push(alarm.clone());
        self.store.save_all(&working)?;
        state.alarms = working;
        state.high_water = state.high_water.max(id);

        info!(alarm_id = id, time = %alarm.time_label(), "alarm created");
        Ok(alarm)
    }

    /// Replace the stored record with the same id. Returns `false` if there
    /// is none.
    pub fn update(&self, alarm: Alarm) -> Result<bool> {
        alarm::validate_time(alarm.hour, alarm.minute)?;
        let id = alarm.id;
        let updated = self.with_alarm(id, move |slot| *slot = alarm)?.is_some();
        if updated {
            debug!(alarm_id = id, "alarm updated");
        }
        Ok(updated)
    }

    /// Remove every record with `id`. Returns whether anything was removed.
    pub fn delete(&self, id: AlarmId) -> Result<bool> {
        let removed = self.with_alarms(|alarms| {
            let before = alarms.len();
            alarms.retain(|a| a.id != id);
            before - alarms.len()
        })?;
        if removed > 0 {
            info!(alarm_id = id, "alarm deleted");
        }
        Ok(removed > 0)
    }

    /// Flip `is_enabled`. Enabling resets the snooze count and recomputes
    /// the trigger instant. Returns the alarm after the change.
    pub fn toggle(&self, id: AlarmId) -> Result<Option<Alarm>> {
        let enable = match self.get(id) {
            Some(alarm) => !alarm.is_enabled,
            None => return Ok(None),
        };
        self.set_enabled(id, enable)
    }

    /// Set `is_enabled`. A transition to enabled resets the snooze count and
    /// recomputes the trigger instant; setting the current value changes
    /// nothing.
    pub fn set_enabled(&self, id: AlarmId, enabled: bool) -> Result<Option<Alarm>> {
        let Some(current) = self.get(id) else {
            return Ok(None);
        };
        if current.is_enabled == enabled {
            return Ok(Some(current));
        }
        let next_trigger_at = enabled.then(|| self.next_trigger(current.hour, current.minute));
        let alarm = self.with_alarm(id, |alarm| {
            alarm.is_enabled = enabled;
            if let Some(at) = next_trigger_at {
                alarm.current_snooze_count = 0;
                alarm.next_trigger_at = at;
            }
            alarm.clone()
        })?;
        info!(alarm_id = id, enabled, "alarm toggled");
        Ok(alarm)
    }

    /// Count one snooze against the alarm's budget.
    ///
    /// With an unlimited budget (`max_snooze_count == 0`) this always
    /// succeeds. Otherwise a snooze past the budget disables the alarm and
    /// returns [`SnoozeOutcome::Exhausted`].
    pub fn handle_snooze(&self, id: AlarmId) -> Result<SnoozeOutcome> {
        let outcome = self.with_alarm(id, |alarm| {
            if !alarm.has_unlimited_snooze() && alarm.current_snooze_count >= alarm.max_snooze_count
            {
                alarm.is_enabled = false;
                return SnoozeOutcome::Exhausted;
            }
            alarm.current_snooze_count = alarm.current_snooze_count.saturating_add(1);
            SnoozeOutcome::Granted {
                snooze_count: alarm.current_snooze_count,
            }
        })?;
        let outcome = outcome.unwrap_or(SnoozeOutcome::NotFound);
        debug!(alarm_id = id, ?outcome, "snooze handled");
        Ok(outcome)
    }

    pub fn reset_snooze_count(&self, id: AlarmId) -> Result<bool> {
        Ok(self
            .with_alarm(id, |alarm| alarm.current_snooze_count = 0)?
            .is_some())
    }

    pub fn update_trigger_instant(&self, id: AlarmId, at: DateTime<Utc>) -> Result<bool> {
        Ok(self
            .with_alarm(id, |alarm| alarm.next_trigger_at = at)?
            .is_some())
    }

    /// Recompute the trigger instant of every enabled alarm and return what
    /// the caller must arm. Disabled alarms are left untouched.
    pub fn reschedule_all_enabled(&self) -> Result<Vec<WakeRequest>> {
        let requests = self.with_alarms(|alarms| {
            alarms
                .iter_mut()
                .filter(|alarm| alarm.is_enabled)
                .map(|alarm| {
                    alarm.next_trigger_at = self.clock.next_trigger(alarm.hour, alarm.minute);
                    WakeRequest::for_alarm(alarm)
                })
                .collect::<Vec<_>>()
        })?;
        info!(count = requests.len(), "rescheduled enabled alarms");
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::DAILY_RESET_ALARM_ID;
    use crate::clock::ManualClock;
    use crate::error::{CoreError, PersistenceError};
    use crate::storage::{KeyValueStore, MemoryKv, ALARMS_KEY};
    use chrono::{Duration, FixedOffset, TimeZone};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store whose writes can be switched off.
    #[derive(Default)]
    struct FlakyKv {
        inner: MemoryKv,
        reject: AtomicBool,
    }

    impl KeyValueStore for FlakyKv {
        fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
            if self.reject.load(Ordering::SeqCst) {
                return Err(PersistenceError::WriteRejected(key.to_string()));
            }
            self.inner.put(key, value)
        }
    }

    fn at(h: u32, m: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 10, h, m, 0)
            .unwrap()
    }

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, m, 0).unwrap()
    }

    fn registry_with(
        kv: Arc<dyn KeyValueStore>,
        now: DateTime<FixedOffset>,
    ) -> (AlarmRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        let registry = AlarmRegistry::open(AlarmStore::new(kv), clock.clone()).unwrap();
        (registry, clock)
    }

    fn registry(now: DateTime<FixedOffset>) -> (AlarmRegistry, Arc<ManualClock>) {
        registry_with(Arc::new(MemoryKv::new()), now)
    }

    fn limited(max: u32) -> AlarmDraft {
        AlarmDraft {
            max_snooze_count: max,
            ..AlarmDraft::new(7, 0)
        }
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let (registry, _) = registry(at(6, 0));
        let a = registry.create(AlarmDraft::new(7, 0)).unwrap();
        let b = registry.create(AlarmDraft::new(7, 30)).unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert!(a.is_enabled);
        assert_eq!(a.current_snooze_count, 0);
    }

    #[test]
    fn create_after_passed_time_fires_tomorrow() {
        let (registry, _) = registry(at(8, 5));
        let alarm = registry.create(AlarmDraft::new(8, 0)).unwrap();
        assert_eq!(alarm.next_trigger_at, utc(11, 8, 0));
    }

    #[test]
    fn create_and_reschedule_on_spring_forward_eve_keep_local_time() {
        use chrono_tz::America::New_York;

        let clock = Arc::new(ManualClock::new(
            New_York.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap(),
        ));
        let registry =
            AlarmRegistry::open(AlarmStore::new(Arc::new(MemoryKv::new())), clock.clone())
                .unwrap();

        // 07:00 EDT, not 07:00 EST.
        let alarm = registry.create(AlarmDraft::new(7, 0)).unwrap();
        assert_eq!(alarm.next_trigger_at, utc(10, 11, 0));

        clock.set(New_York.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap());
        let requests = registry.reschedule_all_enabled().unwrap();
        assert_eq!(requests[0].at, utc(11, 11, 0));
    }

    #[test]
    fn create_rejects_out_of_range_time() {
        let (registry, _) = registry(at(8, 5));
        assert!(matches!(
            registry.create(AlarmDraft::new(25, 0)),
            Err(CoreError::Validation(_))
        ));
        assert!(registry.list_all().is_empty());
    }

    #[test]
    fn create_skips_reserved_id() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKv::new());
        let (registry, _) = registry_with(kv.clone(), at(6, 0));
        let mut seeded = registry.create(AlarmDraft::new(7, 0)).unwrap();
        seeded.id = DAILY_RESET_ALARM_ID - 1;
        registry.with_alarms(|alarms| alarms[0] = seeded).unwrap();

        let next = registry.create(AlarmDraft::new(7, 5)).unwrap();
        assert_eq!(next.id, DAILY_RESET_ALARM_ID + 1);
    }

    #[test]
    fn deleted_id_is_not_reissued() {
        let (registry, _) = registry(at(6, 0));
        registry.create(AlarmDraft::new(7, 0)).unwrap();
        let second = registry.create(AlarmDraft::new(7, 1)).unwrap();
        assert!(registry.delete(second.id).unwrap());
        let third = registry.create(AlarmDraft::new(7, 2)).unwrap();
        assert_eq!(third.id, 3);
    }

    #[test]
    fn list_all_is_a_snapshot() {
        let (registry, _) = registry(at(6, 0));
        registry.create(AlarmDraft::new(7, 0)).unwrap();
        let mut snapshot = registry.list_all();
        snapshot[0].label = "changed".into();
        snapshot.clear();
        assert_eq!(registry.list_all().len(), 1);
        assert_eq!(registry.list_all()[0].label, "");
    }

    #[test]
    fn mutations_are_persisted() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKv::new());
        let (registry, _) = registry_with(kv.clone(), at(6, 0));
        let alarm = registry.create(AlarmDraft::new(7, 0).with_label("run")).unwrap();
        registry.handle_snooze(alarm.id).unwrap();

        let (reopened, _) = registry_with(kv, at(6, 0));
        let stored = reopened.get(alarm.id).unwrap();
        assert_eq!(stored.label, "run");
        assert_eq!(stored.current_snooze_count, 1);
    }

    #[test]
    fn update_replaces_in_place() {
        let (registry, _) = registry(at(6, 0));
        let mut alarm = registry.create(AlarmDraft::new(7, 0)).unwrap();
        alarm.label = "renamed".into();
        alarm.is_daily_reset = true;
        assert!(registry.update(alarm.clone()).unwrap());
        assert_eq!(registry.get(alarm.id).unwrap(), alarm);
    }

    #[test]
    fn update_of_missing_id_is_a_reported_noop() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKv::new());
        let (registry, _) = registry_with(kv.clone(), at(6, 0));
        let mut alarm = registry.create(AlarmDraft::new(7, 0)).unwrap();
        let before = kv.get(ALARMS_KEY).unwrap();
        alarm.id = 42;
        assert!(!registry.update(alarm).unwrap());
        assert_eq!(registry.list_all().len(), 1);
        assert_eq!(kv.get(ALARMS_KEY).unwrap(), before);
    }

    #[test]
    fn toggle_missing_id_is_noop() {
        let (registry, _) = registry(at(6, 0));
        assert!(registry.toggle(9).unwrap().is_none());
    }

    #[test]
    fn toggle_on_resets_snooze_and_recomputes_trigger() {
        let (registry, clock) = registry(at(6, 0));
        let alarm = registry.create(limited(3)).unwrap();
        registry.handle_snooze(alarm.id).unwrap();
        registry.handle_snooze(alarm.id).unwrap();

        let off = registry.toggle(alarm.id).unwrap().unwrap();
        assert!(!off.is_enabled);
        assert_eq!(off.current_snooze_count, 2);

        clock.set(at(9, 0));
        let on = registry.toggle(alarm.id).unwrap().unwrap();
        assert!(on.is_enabled);
        assert_eq!(on.current_snooze_count, 0);
        assert_eq!(on.next_trigger_at, utc(11, 7, 0));
    }

    #[test]
    fn unlimited_snooze_never_disables() {
        let (registry, _) = registry(at(6, 0));
        let alarm = registry.create(limited(0)).unwrap();
        for n in 1..=50 {
            assert_eq!(
                registry.handle_snooze(alarm.id).unwrap(),
                SnoozeOutcome::Granted { snooze_count: n }
            );
        }
        assert!(registry.get(alarm.id).unwrap().is_enabled);
    }

    #[test]
    fn budget_of_one_allows_one_snooze() {
        let (registry, _) = registry(at(6, 0));
        let alarm = registry.create(limited(1)).unwrap();

        assert_eq!(
            registry.handle_snooze(alarm.id).unwrap(),
            SnoozeOutcome::Granted { snooze_count: 1 }
        );
        assert_eq!(registry.get(alarm.id).unwrap().current_snooze_count, 1);

        assert_eq!(registry.handle_snooze(alarm.id).unwrap(), SnoozeOutcome::Exhausted);
        let after = registry.get(alarm.id).unwrap();
        assert!(!after.is_enabled);
        assert_eq!(after.current_snooze_count, 1);
    }

    #[test]
    fn budget_of_n_exhausts_on_call_n_plus_one() {
        let (registry, _) = registry(at(6, 0));
        let alarm = registry.create(limited(4)).unwrap();
        let mut last = 0;
        for _ in 0..4 {
            let outcome = registry.handle_snooze(alarm.id).unwrap();
            assert!(outcome.is_granted());
            let count = registry.get(alarm.id).unwrap().current_snooze_count;
            assert!(count > last);
            last = count;
        }
        assert_eq!(registry.handle_snooze(alarm.id).unwrap(), SnoozeOutcome::Exhausted);
        assert!(!registry.get(alarm.id).unwrap().is_enabled);
    }

    #[test]
    fn snooze_of_missing_id() {
        let (registry, _) = registry(at(6, 0));
        assert_eq!(registry.handle_snooze(5).unwrap(), SnoozeOutcome::NotFound);
    }

    #[test]
    fn reset_and_trigger_setters() {
        let (registry, _) = registry(at(6, 0));
        let alarm = registry.create(limited(2)).unwrap();
        registry.handle_snooze(alarm.id).unwrap();
        assert!(registry.reset_snooze_count(alarm.id).unwrap());
        assert_eq!(registry.get(alarm.id).unwrap().current_snooze_count, 0);

        assert!(registry.update_trigger_instant(alarm.id, utc(12, 7, 0)).unwrap());
        assert_eq!(registry.get(alarm.id).unwrap().next_trigger_at, utc(12, 7, 0));
        assert!(!registry.reset_snooze_count(77).unwrap());
    }

    #[test]
    fn reschedule_returns_only_enabled_alarms() {
        let (registry, clock) = registry(at(6, 0));
        let a = registry.create(AlarmDraft::new(7, 0).with_label("a")).unwrap();
        let b = registry.create(AlarmDraft::new(5, 30).with_label("b")).unwrap();
        let c = registry.create(AlarmDraft::new(9, 0).with_label("c")).unwrap();
        registry.toggle(c.id).unwrap();

        clock.advance(Duration::days(2));
        let mut requests = registry.reschedule_all_enabled().unwrap();
        requests.sort_by_key(|r| r.alarm_id);

        assert_eq!(
            requests,
            vec![
                WakeRequest {
                    alarm_id: a.id,
                    at: utc(12, 7, 0),
                    label: "a".into(),
                },
                WakeRequest {
                    alarm_id: b.id,
                    at: utc(13, 5, 30),
                    label: "b".into(),
                },
            ]
        );
        assert_eq!(registry.get(a.id).unwrap().next_trigger_at, utc(12, 7, 0));
        assert_eq!(registry.get(c.id).unwrap().next_trigger_at, c.next_trigger_at);
    }

    #[test]
    fn failed_write_leaves_memory_untouched() {
        let kv = Arc::new(FlakyKv::default());
        let (registry, _) = registry_with(kv.clone(), at(6, 0));
        let alarm = registry.create(limited(1)).unwrap();

        kv.reject.store(true, Ordering::SeqCst);
        assert!(matches!(
            registry.handle_snooze(alarm.id),
            Err(CoreError::Persistence(PersistenceError::WriteRejected(_)))
        ));
        assert!(registry.create(AlarmDraft::new(8, 0)).is_err());
        assert!(registry.delete(alarm.id).is_err());

        assert_eq!(registry.list_all(), vec![alarm.clone()]);

        kv.reject.store(false, Ordering::SeqCst);
        assert_eq!(registry.create(AlarmDraft::new(8, 0)).unwrap().id, 2);
    }
}
