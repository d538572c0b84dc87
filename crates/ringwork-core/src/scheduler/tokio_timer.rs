//! In-process wake timer backed by tokio tasks.
//!
//! Each pending id owns one sleeping task and the token that cancels it.
//! Fired requests are delivered as [`WakeEvent`]s on an unbounded channel.
//!
//! Tokio's clock is monotonic and stops while the host is suspended, so a
//! task sleeps in slices of at most [`WALL_CLOCK_POLL`] and checks the wall
//! clock between them. A request fires at its monotonic deadline or as soon
//! as the wall clock reaches it, whichever comes first.
//! Nothing survives the process; the daemon re-arms from the registry at
//! start-up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{WakePayload, WakeTimer};
use crate::alarm::AlarmId;
use crate::clock::Clock;
use crate::error::{CoreError, Result};

/// Longest a pending request sleeps before re-reading the wall clock.
const WALL_CLOCK_POLL: Duration = Duration::from_secs(30);

/// A wake request that came due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeEvent {
    pub alarm_id: AlarmId,
    pub label: String,
    pub scheduled_for: DateTime<Utc>,
}

struct Pending {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct PendingMap {
    next_generation: u64,
    entries: HashMap<AlarmId, Pending>,
}

pub struct TokioWakeTimer {
    pending: Arc<Mutex<PendingMap>>,
    tx: mpsc::UnboundedSender<WakeEvent>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
}

impl TokioWakeTimer {
    /// Build a timer on the current tokio runtime and return the receiving
    /// end of its wake channel.
    ///
    /// # Errors
    /// Fails when called outside a tokio runtime.
    pub fn new(clock: Arc<dyn Clock>) -> Result<(Self, mpsc::UnboundedReceiver<WakeEvent>)> {
        let runtime = Handle::try_current().map_err(|e| CoreError::WakeTimer(e.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        let timer = Self {
            pending: Arc::new(Mutex::new(PendingMap::default())),
            tx,
            clock,
            runtime,
        };
        Ok((timer, rx))
    }

    /// Ids with a request still waiting to fire.
    pub fn pending_ids(&self) -> Vec<AlarmId> {
        let mut ids: Vec<_> = lock(&self.pending).entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

fn lock(pending: &Mutex<PendingMap>) -> MutexGuard<'_, PendingMap> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

/// Sleep until `deadline` or until `clock` reaches `at`.
async fn wait_until(clock: &dyn Clock, at: DateTime<Utc>, deadline: Instant) {
    loop {
        let now = Instant::now();
        if now >= deadline || clock.now_utc() >= at {
            return;
        }
        let slice = (deadline - now).min(WALL_CLOCK_POLL);
        tokio::time::sleep_until(now + slice).await;
    }
}

impl WakeTimer for TokioWakeTimer {
    fn schedule(&self, alarm_id: AlarmId, at: DateTime<Utc>, payload: WakePayload) -> Result<()> {
        // Instants already in the past fire immediately.
        let delay = (at - self.clock.now_utc()).to_std().unwrap_or_default();
        let deadline = Instant::now() + delay;
        let cancel = CancellationToken::new();

        let generation = {
            let mut map = lock(&self.pending);
            map.next_generation += 1;
            let generation = map.next_generation;
            if let Some(previous) = map.entries.insert(
                alarm_id,
                Pending {
                    generation,
                    cancel: cancel.clone(),
                },
            ) {
                previous.cancel.cancel();
                trace!(alarm_id, "replaced pending wake request");
            }
            generation
        };

        let pending = Arc::clone(&self.pending);
        let tx = self.tx.clone();
        let clock = Arc::clone(&self.clock);
        self.runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = wait_until(clock.as_ref(), at, deadline) => {
                    {
                        let mut map = lock(&pending);
                        if map.entries.get(&alarm_id).is_some_and(|p| p.generation == generation) {
                            map.entries.remove(&alarm_id);
                        }
                    }
                    debug!(alarm_id, "wake request fired");
                    let _ = tx.send(WakeEvent {
                        alarm_id,
                        label: payload.label,
                        scheduled_for: at,
                    });
                }
            }
        });
        Ok(())
    }

    fn cancel(&self, alarm_id: AlarmId) -> Result<()> {
        if let Some(pending) = lock(&self.pending).entries.remove(&alarm_id) {
            pending.cancel.cancel();
            trace!(alarm_id, "cancelled pending wake request");
        }
        Ok(())
    }
}
