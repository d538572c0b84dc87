//! Source of "now".
//!
//! Alarms are set on the local wall clock, so a clock knows its time zone
//! and answers trigger questions in it. The zone's offset is resolved for
//! the day being computed, not the day it is now. Everything stored is UTC.

use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, Local, TimeZone, Utc};

use crate::alarm;

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    /// Next `hour:minute` on this clock's wall clock strictly after now.
    fn next_trigger(&self, hour: u8, minute: u8) -> DateTime<Utc>;

    /// `hour:minute` on this clock's next calendar day.
    fn tomorrow_at(&self, hour: u8, minute: u8) -> DateTime<Utc>;
}

/// The system clock in the local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn next_trigger(&self, hour: u8, minute: u8) -> DateTime<Utc> {
        alarm::next_trigger(hour, minute, &Local::now()).with_timezone(&Utc)
    }

    fn tomorrow_at(&self, hour: u8, minute: u8) -> DateTime<Utc> {
        alarm::tomorrow_at(hour, minute, &Local::now()).with_timezone(&Utc)
    }
}

/// A clock that only moves when told to.
///
/// The zone is taken from the instant it is built with, so a
/// `ManualClock<chrono_tz::Tz>` follows that zone's DST rules.
#[derive(Debug)]
pub struct ManualClock<Z: TimeZone = FixedOffset> {
    zone: Z,
    now: Mutex<DateTime<Utc>>,
}

impl<Z: TimeZone> ManualClock<Z> {
    pub fn new(now: DateTime<Z>) -> Self {
        Self {
            zone: now.timezone(),
            now: Mutex::new(now.with_timezone(&Utc)),
        }
    }

    /// Current instant in the clock's zone.
    pub fn now(&self) -> DateTime<Z> {
        self.instant().with_timezone(&self.zone)
    }

    pub fn set<T: TimeZone>(&self, now: DateTime<T>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now.with_timezone(&Utc);
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    fn instant(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<Z: TimeZone + Send + Sync> Clock for ManualClock<Z> {
    fn now_utc(&self) -> DateTime<Utc> {
        self.instant()
    }

    fn next_trigger(&self, hour: u8, minute: u8) -> DateTime<Utc> {
        alarm::next_trigger(hour, minute, &self.now()).with_timezone(&Utc)
    }

    fn tomorrow_at(&self, hour: u8, minute: u8) -> DateTime<Utc> {
        alarm::tomorrow_at(hour, minute, &self.now()).with_timezone(&Utc)
    }
}
