//! Alarm lifecycle facade.
//!
//! [`AlarmService`] pairs every registry mutation with the matching arm or
//! disarm, routes delivered wake events, and runs the cold-start hook. A
//! registry error returns before the scheduler is touched, so no timer is
//! ever armed for state that failed to persist.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::alarm::{self, Alarm, AlarmDraft, AlarmId, DAILY_RESET_ALARM_ID, INVALID_ALARM_ID};
use crate::clock::Clock;
use crate::error::Result;
use crate::events::Event;
use crate::registry::AlarmRegistry;
use crate::scheduler::{WakeRequest, WakeScheduler, WakeTimer};
use crate::session::{PresentationSink, RingingSessionController};
use crate::storage::{AlarmStore, KeyValueStore};

/// What a delivered wake event turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Invalid sentinel id; logged and discarded.
    Dropped,
    /// Daily reset: every enabled alarm re-armed. `next_reset_at` is `None`
    /// when the daily reset has since been switched off.
    DailyReset {
        rearmed: Vec<WakeRequest>,
        next_reset_at: Option<DateTime<Utc>>,
    },
    /// A ringing session started.
    Ringing,
    /// Unknown, disabled, or already ringing alarm.
    Ignored,
}

impl Dispatch {
    /// Event describing a dispatch that produced no session. Ringing
    /// sessions publish their own events.
    pub fn event(&self, at: DateTime<Utc>) -> Option<Event> {
        match self {
            Dispatch::Dropped => Some(Event::WakeDropped {
                alarm_id: INVALID_ALARM_ID,
                at,
            }),
            Dispatch::DailyReset {
                rearmed,
                next_reset_at: Some(next_reset_at),
            } => Some(Event::DailyResetFired {
                rearmed: rearmed.len(),
                next_reset_at: *next_reset_at,
                at,
            }),
            Dispatch::DailyReset { .. } | Dispatch::Ringing | Dispatch::Ignored => None,
        }
    }
}

/// What the cold-start hook armed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootReport {
    pub armed: Vec<WakeRequest>,
    pub daily_reset_at: Option<DateTime<Utc>>,
}

pub struct AlarmService {
    registry: Arc<AlarmRegistry>,
    scheduler: WakeScheduler,
    sessions: Arc<RingingSessionController>,
}

impl AlarmService {
    pub fn new(
        registry: Arc<AlarmRegistry>,
        scheduler: WakeScheduler,
        sessions: Arc<RingingSessionController>,
    ) -> Self {
        Self {
            registry,
            scheduler,
            sessions,
        }
    }

    /// Wire up a service from its collaborators.
    pub fn open(
        kv: Arc<dyn KeyValueStore>,
        timer: Arc<dyn WakeTimer>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn PresentationSink>,
    ) -> Result<Self> {
        let registry = Arc::new(AlarmRegistry::open(AlarmStore::new(kv), clock)?);
        let scheduler = WakeScheduler::new(timer);
        let sessions = Arc::new(RingingSessionController::new(
            Arc::clone(&registry),
            scheduler.clone(),
            sink,
        ));
        Ok(Self::new(registry, scheduler, sessions))
    }

    pub fn registry(&self) -> &Arc<AlarmRegistry> {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<RingingSessionController> {
        &self.sessions
    }

    pub fn list(&self) -> Vec<Alarm> {
        self.registry.list_all()
    }

    pub fn get(&self, id: AlarmId) -> Option<Alarm> {
        self.registry.get(id)
    }

    /// Create an alarm and arm it.
    pub fn create(&self, draft: AlarmDraft) -> Result<Alarm> {
        let alarm = self.registry.create(draft)?;
        self.scheduler.arm(&WakeRequest::for_alarm(&alarm))?;
        Ok(alarm)
    }

    /// Replace an alarm. The trigger instant is recomputed from the (possibly
    /// new) hour and minute, then the alarm is armed if enabled and disarmed
    /// otherwise. Returns `None` if the id does not exist.
    pub fn update(&self, mut alarm: Alarm) -> Result<Option<Alarm>> {
        alarm::validate_time(alarm.hour, alarm.minute)?;
        alarm.next_trigger_at = self.registry.clock().next_trigger(alarm.hour, alarm.minute);
        if !self.registry.update(alarm.clone())? {
            return Ok(None);
        }
        self.sync_timer(&alarm)?;
        Ok(Some(alarm))
    }

    pub fn toggle(&self, id: AlarmId) -> Result<Option<Alarm>> {
        let alarm = self.registry.toggle(id)?;
        if let Some(alarm) = &alarm {
            self.sync_timer(alarm)?;
        }
        Ok(alarm)
    }

    pub fn set_enabled(&self, id: AlarmId, enabled: bool) -> Result<Option<Alarm>> {
        let alarm = self.registry.set_enabled(id, enabled)?;
        if let Some(alarm) = &alarm {
            self.sync_timer(alarm)?;
        }
        Ok(alarm)
    }

    pub fn delete(&self, id: AlarmId) -> Result<bool> {
        let removed = self.registry.delete(id)?;
        if removed {
            self.scheduler.disarm(id)?;
        }
        Ok(removed)
    }

    fn sync_timer(&self, alarm: &Alarm) -> Result<()> {
        if alarm.is_enabled {
            self.scheduler.arm(&WakeRequest::for_alarm(alarm))
        } else {
            self.scheduler.disarm(alarm.id)
        }
    }

    pub fn dismiss(&self, id: AlarmId) -> Result<Option<Event>> {
        self.sessions.dismiss(id)
    }

    pub fn snooze(&self, id: AlarmId) -> Result<Option<Event>> {
        self.sessions.snooze(id)
    }

    /// Route a delivered wake event.
    ///
    /// Must run inside a tokio runtime when `id` can start a ringing
    /// session.
    pub fn dispatch(&self, id: AlarmId) -> Result<Dispatch> {
        match id {
            INVALID_ALARM_ID => {
                warn!("wake event without a valid alarm id dropped");
                Ok(Dispatch::Dropped)
            }
            DAILY_RESET_ALARM_ID => self.run_daily_reset(),
            id => match self.registry.get(id) {
                Some(alarm) if alarm.is_enabled => Ok(match self.sessions.on_wake(id) {
                    Some(_) => Dispatch::Ringing,
                    None => Dispatch::Ignored,
                }),
                Some(_) => {
                    debug!(alarm_id = id, "wake for disabled alarm ignored");
                    Ok(Dispatch::Ignored)
                }
                None => {
                    debug!(alarm_id = id, "wake for unknown alarm ignored");
                    Ok(Dispatch::Ignored)
                }
            },
        }
    }

    fn run_daily_reset(&self) -> Result<Dispatch> {
        let rearmed = self.registry.reschedule_all_enabled()?;
        self.scheduler.arm_all(&rearmed)?;
        let next_reset_at = if self.registry.store().daily_reset_enabled()? {
            Some(self.scheduler.arm_daily_reset(self.registry.clock().as_ref())?)
        } else {
            None
        };
        info!(count = rearmed.len(), "daily reset fired");
        Ok(Dispatch::DailyReset {
            rearmed,
            next_reset_at,
        })
    }

    /// Cold-start hook: re-arm every enabled alarm and, when the daily reset
    /// is on, the next daily reset.
    pub fn cold_start(&self) -> Result<BootReport> {
        let armed = self.registry.reschedule_all_enabled()?;
        self.scheduler.arm_all(&armed)?;
        let daily_reset_at = if self.registry.store().daily_reset_enabled()? {
            Some(self.scheduler.arm_daily_reset(self.registry.clock().as_ref())?)
        } else {
            None
        };
        info!(
            armed = armed.len(),
            daily_reset = daily_reset_at.is_some(),
            "cold start complete"
        );
        Ok(BootReport {
            armed,
            daily_reset_at,
        })
    }

    pub fn daily_reset_enabled(&self) -> Result<bool> {
        self.registry.store().daily_reset_enabled()
    }

    /// Persist the daily-reset flag and arm or disarm the daily reset to
    /// match. Returns the armed instant when switched on.
    pub fn set_daily_reset_enabled(&self, enabled: bool) -> Result<Option<DateTime<Utc>>> {
        self.registry.store().set_daily_reset_enabled(enabled)?;
        if enabled {
            let at = self.scheduler.arm_daily_reset(self.registry.clock().as_ref())?;
            Ok(Some(at))
        } else {
            self.scheduler.disarm_daily_reset()?;
            Ok(None)
        }
    }
}
