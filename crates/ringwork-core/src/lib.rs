//! # Ringwork Core Library
//!
//! This library provides the alarm lifecycle and scheduling engine behind the
//! `ringwork` CLI. It owns the alarm records, computes trigger instants,
//! bounds snoozes, and drives each ringing session to exactly one outcome.
//! Sound, vibration and the real wake-up timer stay outside, behind traits.
//!
//! ## Architecture
//!
//! - **Alarm model**: records, reserved ids, trigger-time math, id allocation
//! - **Storage**: a key-value seam backed by SQLite, and TOML configuration
//! - **Registry**: the in-memory alarm list; every mutation is persisted
//!   before it becomes visible
//! - **Scheduler**: arms and disarms wake requests on a [`WakeTimer`]
//! - **Sessions**: the ringing state machine with its auto-snooze timer
//!
//! ## Key Components
//!
//! - [`AlarmService`]: lifecycle operations, wake dispatch, cold start
//! - [`AlarmRegistry`]: authoritative alarm list
//! - [`RingingSessionController`]: dismiss / snooze / auto-snooze races
//! - [`Database`]: durable key-value storage
//! - [`Config`]: application configuration management

pub mod alarm;
pub mod clock;
pub mod error;
pub mod events;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod storage;

pub use alarm::{
    Alarm, AlarmDraft, AlarmId, SoundRef, VibrationPattern, DAILY_RESET_ALARM_ID,
    INVALID_ALARM_ID,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, PersistenceError, ValidationError};
pub use events::Event;
pub use registry::{AlarmRegistry, SnoozeOutcome};
pub use scheduler::{
    MemoryWakeTimer, TokioWakeTimer, WakeEvent, WakePayload, WakeRequest, WakeScheduler,
    WakeTimer,
};
pub use service::{AlarmService, BootReport, Dispatch};
pub use session::{LogSink, PresentationSink, RingingSessionController, SessionState};
pub use storage::{AlarmStore, Config, Database, KeyValueStore, MemoryKv};
