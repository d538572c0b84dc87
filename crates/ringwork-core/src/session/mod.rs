//! Ringing sessions.
//!
//! A session starts when a wake event is delivered for an existing alarm and
//! ends with exactly one of three transitions: the user dismisses, the user
//! snoozes, or the work duration elapses and the alarm snoozes itself.
//!
//! ```text
//! Idle ─wake─▶ Ringing ─┬─ dismiss ──▶ Dismissing ──┐
//!                       ├─ snooze ───▶ Snoozing ────┼─▶ Idle
//!                       └─ timeout ──▶ AutoSnoozing ┘
//! ```
//!
//! The session state is the single "resolved" flag: the first caller to move
//! it out of `Ringing` wins, cancels the auto-snooze timer, and applies its
//! transition. Every later caller sees a resolved session and does nothing.

mod sink;

pub use sink::{LogSink, PresentationSink};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::alarm::AlarmId;
use crate::clock::Clock;
use crate::error::Result;
use crate::events::Event;
use crate::registry::{AlarmRegistry, SnoozeOutcome};
use crate::scheduler::{WakeRequest, WakeScheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Ringing,
    Dismissing,
    Snoozing,
    AutoSnoozing,
}

struct RingingSession {
    alarm_id: AlarmId,
    state: Mutex<SessionState>,
    auto_snooze: CancellationToken,
}

impl RingingSession {
    fn new(alarm_id: AlarmId) -> Self {
        Self {
            alarm_id,
            state: Mutex::new(SessionState::Ringing),
            auto_snooze: CancellationToken::new(),
        }
    }

    /// Move out of `Ringing`. Only the first caller gets `true`.
    fn try_resolve(&self, to: SessionState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != SessionState::Ringing {
            return false;
        }
        *state = to;
        true
    }

    fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct RingingSessionController {
    registry: Arc<AlarmRegistry>,
    scheduler: WakeScheduler,
    sink: Arc<dyn PresentationSink>,
    sessions: Mutex<HashMap<AlarmId, Arc<RingingSession>>>,
    events: Option<mpsc::UnboundedSender<Event>>,
}

impl RingingSessionController {
    pub fn new(
        registry: Arc<AlarmRegistry>,
        scheduler: WakeScheduler,
        sink: Arc<dyn PresentationSink>,
    ) -> Self {
        Self {
            registry,
            scheduler,
            sink,
            sessions: Mutex::new(HashMap::new()),
            events: None,
        }
    }

    /// Also send every event produced by this controller down `tx`,
    /// including those of auto-snoozes, which have no caller to return to.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<Event>) -> Self {
        self.events = Some(tx);
        self
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<AlarmId, Arc<RingingSession>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Ids of alarms currently ringing.
    pub fn ringing(&self) -> Vec<AlarmId> {
        let mut ids: Vec<_> = self
            .sessions()
            .values()
            .filter(|s| s.state() == SessionState::Ringing)
            .map(|s| s.alarm_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// State of the live session for `alarm_id`, if there is one. A resolved
    /// session is only visible while its transition is being applied.
    pub fn session_state(&self, alarm_id: AlarmId) -> Option<SessionState> {
        self.sessions().get(&alarm_id).map(|s| s.state())
    }

    pub fn is_ringing(&self, alarm_id: AlarmId) -> bool {
        self.session_state(alarm_id) == Some(SessionState::Ringing)
    }

    fn emit(&self, event: &Event) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event.clone());
        }
    }

    /// Start a ringing session for a delivered wake event.
    ///
    /// Returns `None` when the alarm no longer exists or is already ringing.
    /// Must be called inside a tokio runtime; the auto-snooze timer is a
    /// spawned task.
    pub fn on_wake(self: &Arc<Self>, alarm_id: AlarmId) -> Option<Event> {
        let Some(alarm) = self.registry.get(alarm_id) else {
            debug!(alarm_id, "wake for unknown alarm ignored");
            return None;
        };

        let session = {
            let mut sessions = self.sessions();
            if sessions
                .get(&alarm_id)
                .is_some_and(|s| s.state() == SessionState::Ringing)
            {
                debug!(alarm_id, "alarm already ringing");
                return None;
            }
            let session = Arc::new(RingingSession::new(alarm_id));
            sessions.insert(alarm_id, Arc::clone(&session));
            session
        };

        info!(alarm_id, label = %alarm.label, "ringing session started");
        self.sink.begin_ringing(&alarm);

        let controller: Weak<Self> = Arc::downgrade(self);
        let cancel = session.auto_snooze.clone();
        let work = alarm.work_duration();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(work) => {
                    let Some(controller) = controller.upgrade() else { return };
                    if let Err(e) = controller.auto_snooze(alarm_id) {
                        error!(alarm_id, error = %e, "auto-snooze failed");
                    }
                }
            }
        });

        let event = Event::RingingStarted {
            alarm_id,
            label: alarm.label,
            vibration: alarm.vibration_pattern,
            sound: alarm.sound,
            at: self.registry.clock().now_utc(),
        };
        self.emit(&event);
        Some(event)
    }

    /// Resolve the live session for `alarm_id` into `to`, or `None` if there
    /// is none or another transition already won.
    fn claim(&self, alarm_id: AlarmId, to: SessionState) -> Option<Arc<RingingSession>> {
        let session = self.sessions().get(&alarm_id).cloned()?;
        if !session.try_resolve(to) {
            warn!(alarm_id, ?to, "session already resolved");
            return None;
        }
        session.auto_snooze.cancel();
        Some(session)
    }

    fn finish(&self, session: &Arc<RingingSession>) {
        {
            let mut sessions = self.sessions();
            if sessions
                .get(&session.alarm_id)
                .is_some_and(|live| Arc::ptr_eq(live, session))
            {
                sessions.remove(&session.alarm_id);
            }
        }
        self.sink.end_ringing(session.alarm_id);
    }

    /// Run `apply` for a claimed session, end the session whatever the
    /// outcome, then publish the event.
    fn resolve(
        &self,
        alarm_id: AlarmId,
        to: SessionState,
        apply: impl FnOnce() -> Result<Option<Event>>,
    ) -> Result<Option<Event>> {
        let Some(session) = self.claim(alarm_id, to) else {
            return Ok(None);
        };
        let outcome = apply();
        self.finish(&session);
        let event = outcome?;
        if let Some(event) = &event {
            self.emit(event);
        }
        Ok(event)
    }

    /// User dismissed the ringing alarm.
    ///
    /// A daily-reset alarm stays enabled and is re-armed for the same time
    /// tomorrow; any other alarm is disabled and disarmed.
    pub fn dismiss(&self, alarm_id: AlarmId) -> Result<Option<Event>> {
        self.resolve(alarm_id, SessionState::Dismissing, || {
            self.apply_dismiss(alarm_id)
        })
    }

    /// User asked for a snooze.
    pub fn snooze(&self, alarm_id: AlarmId) -> Result<Option<Event>> {
        self.resolve(alarm_id, SessionState::Snoozing, || {
            self.apply_snooze(alarm_id, false)
        })
    }

    fn auto_snooze(&self, alarm_id: AlarmId) -> Result<Option<Event>> {
        self.resolve(alarm_id, SessionState::AutoSnoozing, || {
            self.apply_snooze(alarm_id, true)
        })
    }

    fn apply_dismiss(&self, alarm_id: AlarmId) -> Result<Option<Event>> {
        let Some(alarm) = self.registry.get(alarm_id) else {
            return Ok(None);
        };
        self.registry.reset_snooze_count(alarm_id)?;

        let next_trigger_at = if alarm.is_daily_reset {
            let at = self.registry.clock().tomorrow_at(alarm.hour, alarm.minute);
            self.registry.set_enabled(alarm_id, true)?;
            self.registry.update_trigger_instant(alarm_id, at)?;
            self.scheduler.arm(&WakeRequest {
                alarm_id,
                at,
                label: alarm.label.clone(),
            })?;
            info!(alarm_id, %at, "daily alarm dismissed, re-armed for tomorrow");
            Some(at)
        } else {
            if alarm.is_enabled {
                self.registry.toggle(alarm_id)?;
            }
            self.scheduler.disarm(alarm_id)?;
            info!(alarm_id, "alarm dismissed");
            None
        };

        Ok(Some(Event::Dismissed {
            alarm_id,
            next_trigger_at,
            at: self.registry.clock().now_utc(),
        }))
    }

    fn apply_snooze(&self, alarm_id: AlarmId, automatic: bool) -> Result<Option<Event>> {
        let event = match self.registry.handle_snooze(alarm_id)? {
            SnoozeOutcome::Granted { snooze_count } => {
                let Some(alarm) = self.registry.get(alarm_id) else {
                    return Ok(None);
                };
                let now = self.registry.clock().now_utc();
                let rearm_at = if automatic {
                    alarm.break_until(now)
                } else {
                    alarm.snooze_until(now)
                };
                self.scheduler.arm(&WakeRequest {
                    alarm_id,
                    at: rearm_at,
                    label: alarm.label,
                })?;
                info!(alarm_id, snooze_count, automatic, %rearm_at, "alarm snoozed");
                Event::Snoozed {
                    alarm_id,
                    snooze_count,
                    rearm_at,
                    automatic,
                    at: self.registry.clock().now_utc(),
                }
            }
            SnoozeOutcome::Exhausted => {
                if !automatic {
                    self.sink.snooze_exhausted(alarm_id);
                }
                info!(alarm_id, automatic, "snooze budget exhausted, alarm disabled");
                Event::SnoozeExhausted {
                    alarm_id,
                    automatic,
                    at: self.registry.clock().now_utc(),
                }
            }
            SnoozeOutcome::NotFound => return Ok(None),
        };
        Ok(Some(event))
    }
}
