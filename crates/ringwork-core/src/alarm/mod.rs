//! Alarm data model.
//!
//! An [`Alarm`] is one user-created wake-up event. Records are owned by the
//! [`AlarmRegistry`](crate::registry::AlarmRegistry) and persisted as a JSON
//! array by the [`AlarmStore`](crate::storage::AlarmStore).
//!
//! Two ids sit outside the user id space and are never handed out:
//! [`INVALID_ALARM_ID`] marks a missing or malformed id on an incoming wake
//! event, and [`DAILY_RESET_ALARM_ID`] is the wake request that re-arms every
//! enabled alarm once a day.

mod id;
mod trigger;

pub use id::allocate_id;
pub use trigger::{next_trigger, tomorrow_at};

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub type AlarmId = u32;

/// Id carried by a wake event whose payload had no usable alarm id.
pub const INVALID_ALARM_ID: AlarmId = 0;

/// Id of the system wake request that re-arms all enabled alarms.
pub const DAILY_RESET_ALARM_ID: AlarmId = 999_999;

pub const DEFAULT_SNOOZE_INTERVAL_MS: u64 = 3 * 60 * 1000;
pub const DEFAULT_WORK_DURATION_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_BREAK_DURATION_MS: u64 = 2 * 60 * 1000;

/// Whether `id` is one of the reserved sentinel values.
pub fn is_reserved(id: AlarmId) -> bool {
    id == INVALID_ALARM_ID || id == DAILY_RESET_ALARM_ID
}

/// Vibration pattern played while an alarm rings.
///
/// Only the pattern name lives here; turning it into a device effect is the
/// presentation sink's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum VibrationPattern {
    Default,
    Short,
    Long,
    Custom,
    #[default]
    None,
}

impl VibrationPattern {
    pub const ALL: [VibrationPattern; 5] = [
        VibrationPattern::Default,
        VibrationPattern::Short,
        VibrationPattern::Long,
        VibrationPattern::Custom,
        VibrationPattern::None,
    ];

    pub fn name(self) -> &'static str {
        match self {
            VibrationPattern::Default => "DEFAULT",
            VibrationPattern::Short => "SHORT",
            VibrationPattern::Long => "LONG",
            VibrationPattern::Custom => "CUSTOM",
            VibrationPattern::None => "NONE",
        }
    }

    /// Parse a stored or user-supplied name. Case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|pattern| pattern.name().eq_ignore_ascii_case(name))
    }
}

impl From<Option<String>> for VibrationPattern {
    // Unknown names and null both read back as no vibration.
    fn from(value: Option<String>) -> Self {
        value
            .as_deref()
            .and_then(Self::from_name)
            .unwrap_or(VibrationPattern::None)
    }
}

impl From<VibrationPattern> for String {
    fn from(pattern: VibrationPattern) -> Self {
        pattern.name().to_string()
    }
}

impl fmt::Display for VibrationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which sound to play while ringing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum SoundRef {
    /// Whatever the platform considers its default alarm sound.
    #[default]
    PlatformDefault,
    /// Ring without sound.
    Silent,
    /// Opaque identifier understood by the presentation sink.
    Uri(String),
}

impl SoundRef {
    /// Stored marker for [`SoundRef::Silent`].
    pub const SILENT_MARKER: &'static str = "NO_SOUND";

    pub fn parse(value: &str) -> Self {
        match value {
            "" => SoundRef::PlatformDefault,
            Self::SILENT_MARKER => SoundRef::Silent,
            uri => SoundRef::Uri(uri.to_string()),
        }
    }
}

impl From<Option<String>> for SoundRef {
    fn from(value: Option<String>) -> Self {
        value.as_deref().map(Self::parse).unwrap_or_default()
    }
}

impl From<SoundRef> for Option<String> {
    fn from(sound: SoundRef) -> Self {
        match sound {
            SoundRef::PlatformDefault => None,
            SoundRef::Silent => Some(SoundRef::SILENT_MARKER.to_string()),
            SoundRef::Uri(uri) => Some(uri),
        }
    }
}

impl fmt::Display for SoundRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoundRef::PlatformDefault => f.write_str("default"),
            SoundRef::Silent => f.write_str("silent"),
            SoundRef::Uri(uri) => f.write_str(uri),
        }
    }
}

fn default_snooze_interval_ms() -> u64 {
    DEFAULT_SNOOZE_INTERVAL_MS
}
fn default_work_duration_ms() -> u64 {
    DEFAULT_WORK_DURATION_MS
}
fn default_break_duration_ms() -> u64 {
    DEFAULT_BREAK_DURATION_MS
}

/// A single alarm record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: AlarmId,
    pub hour: u8,
    pub minute: u8,
    #[serde(default)]
    pub label: String,
    pub is_enabled: bool,
    /// Next (or most recently computed) fire point.
    pub next_trigger_at: DateTime<Utc>,
    /// Dismissal re-arms the alarm for the same time tomorrow instead of
    /// disabling it.
    #[serde(default)]
    pub is_daily_reset: bool,
    /// 0 means unlimited.
    #[serde(default)]
    pub max_snooze_count: u32,
    #[serde(default)]
    pub current_snooze_count: u32,
    #[serde(default)]
    pub vibration_pattern: VibrationPattern,
    #[serde(default = "default_snooze_interval_ms")]
    pub snooze_interval_ms: u64,
    /// How long the alarm rings unattended before it snoozes itself.
    #[serde(default = "default_work_duration_ms")]
    pub work_duration_ms: u64,
    /// Delay before an auto-snoozed alarm rings again.
    #[serde(default = "default_break_duration_ms")]
    pub break_duration_ms: u64,
    #[serde(default)]
    pub sound: SoundRef,
}

impl Alarm {
    pub fn has_unlimited_snooze(&self) -> bool {
        self.max_snooze_count == 0
    }

    pub fn work_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.work_duration_ms)
    }

    /// Instant one snooze interval after `now`.
    pub fn snooze_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        offset_ms(now, self.snooze_interval_ms)
    }

    /// Instant one break duration after `now`.
    pub fn break_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        offset_ms(now, self.break_duration_ms)
    }

    /// `HH:MM` wall-clock label.
    pub fn time_label(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

fn offset_ms(now: DateTime<Utc>, ms: u64) -> DateTime<Utc> {
    let delta = Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX));
    now.checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Everything the caller chooses when creating an alarm.
///
/// The registry fills in the id, the trigger instant, and the counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmDraft {
    pub hour: u8,
    pub minute: u8,
    pub label: String,
    pub daily_reset: bool,
    pub max_snooze_count: u32,
    pub vibration: VibrationPattern,
    pub snooze_interval_ms: u64,
    pub work_duration_ms: u64,
    pub break_duration_ms: u64,
    pub sound: SoundRef,
}

impl AlarmDraft {
    /// A draft for `hour:minute` with every other field at its default.
    pub fn new(hour: u8, minute: u8) -> Self {
        Self {
            hour,
            minute,
            label: String::new(),
            daily_reset: false,
            max_snooze_count: 0,
            vibration: VibrationPattern::None,
            snooze_interval_ms: DEFAULT_SNOOZE_INTERVAL_MS,
            work_duration_ms: DEFAULT_WORK_DURATION_MS,
            break_duration_ms: DEFAULT_BREAK_DURATION_MS,
            sound: SoundRef::PlatformDefault,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_time(self.hour, self.minute)
    }
}

pub fn validate_time(hour: u8, minute: u8) -> Result<(), ValidationError> {
    if hour > 23 {
        return Err(ValidationError::HourOutOfRange(hour));
    }
    if minute > 59 {
        return Err(ValidationError::MinuteOutOfRange(minute));
    }
    Ok(())
}
