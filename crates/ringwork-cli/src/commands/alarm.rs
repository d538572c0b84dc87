use std::error::Error;

use clap::{Args, Subcommand};
use ringwork_core::{AlarmDraft, AlarmId, Config, SoundRef, VibrationPattern};

use super::{open_service, print_json};

#[derive(Subcommand)]
pub enum AlarmAction {
    /// Create an alarm
    Add {
        /// Wall-clock time, HH:MM
        #[arg(value_parser = parse_time)]
        time: (u8, u8),
        #[command(flatten)]
        options: AlarmOptions,
    },
    /// List all alarms
    List,
    /// Show one alarm
    Show { id: AlarmId },
    /// Change an existing alarm
    Edit {
        id: AlarmId,
        /// New wall-clock time, HH:MM
        #[arg(long, value_parser = parse_time)]
        time: Option<(u8, u8)>,
        #[command(flatten)]
        options: AlarmOptions,
    },
    /// Flip enabled/disabled
    Toggle { id: AlarmId },
    /// Enable an alarm
    Enable { id: AlarmId },
    /// Disable an alarm
    Disable { id: AlarmId },
    /// Delete an alarm
    Remove { id: AlarmId },
}

/// Optional fields. Unset values fall back to `[alarm_defaults]` on add and
/// are left unchanged on edit.
#[derive(Args)]
pub struct AlarmOptions {
    #[arg(long)]
    label: Option<String>,
    /// Re-arm for tomorrow on dismissal instead of disabling
    #[arg(long)]
    daily_reset: Option<bool>,
    /// Maximum snoozes before the alarm gives up (0 = unlimited)
    #[arg(long)]
    max_snooze: Option<u32>,
    /// DEFAULT, SHORT, LONG, CUSTOM or NONE
    #[arg(long, value_parser = parse_vibration)]
    vibration: Option<VibrationPattern>,
    #[arg(long)]
    snooze_secs: Option<u64>,
    /// How long to ring before snoozing automatically
    #[arg(long)]
    work_secs: Option<u64>,
    /// Delay before an automatically snoozed alarm rings again
    #[arg(long)]
    break_secs: Option<u64>,
    /// Sound URI, or NO_SOUND for silence
    #[arg(long)]
    sound: Option<String>,
}

impl AlarmOptions {
    fn apply(self, draft: &mut AlarmDraft) {
        if let Some(label) = self.label {
            draft.label = label;
        }
        if let Some(daily_reset) = self.daily_reset {
            draft.daily_reset = daily_reset;
        }
        if let Some(max) = self.max_snooze {
            draft.max_snooze_count = max;
        }
        if let Some(vibration) = self.vibration {
            draft.vibration = vibration;
        }
        if let Some(secs) = self.snooze_secs {
            draft.snooze_interval_ms = secs.saturating_mul(1000);
        }
        if let Some(secs) = self.work_secs {
            draft.work_duration_ms = secs.saturating_mul(1000);
        }
        if let Some(secs) = self.break_secs {
            draft.break_duration_ms = secs.saturating_mul(1000);
        }
        if let Some(sound) = self.sound {
            draft.sound = SoundRef::parse(&sound);
        }
    }
}

fn parse_time(s: &str) -> Result<(u8, u8), String> {
    let (hour, minute) = s
        .split_once(':')
        .ok_or_else(|| format!("expected HH:MM, got '{s}'"))?;
    let hour: u8 = hour.parse().map_err(|_| format!("invalid hour '{hour}'"))?;
    let minute: u8 = minute
        .parse()
        .map_err(|_| format!("invalid minute '{minute}'"))?;
    if hour > 23 || minute > 59 {
        return Err(format!("'{s}' is not a valid time of day"));
    }
    Ok((hour, minute))
}

fn parse_vibration(s: &str) -> Result<VibrationPattern, String> {
    VibrationPattern::from_name(s).ok_or_else(|| format!("unknown vibration pattern '{s}'"))
}

fn not_found(id: AlarmId) -> Box<dyn Error> {
    format!("alarm {id} not found").into()
}

pub fn run(action: AlarmAction) -> Result<(), Box<dyn Error>> {
    let service = open_service()?;
    match action {
        AlarmAction::Add {
            time: (hour, minute),
            options,
        } => {
            let mut draft = Config::load_or_default().alarm_defaults.draft(hour, minute);
            options.apply(&mut draft);
            let alarm = service.create(draft)?;
            print_json(&alarm)?;
        }
        AlarmAction::List => {
            print_json(&service.list())?;
        }
        AlarmAction::Show { id } => {
            let alarm = service.get(id).ok_or_else(|| not_found(id))?;
            print_json(&alarm)?;
        }
        AlarmAction::Edit { id, time, options } => {
            let mut alarm = service.get(id).ok_or_else(|| not_found(id))?;
            let (hour, minute) = time.unwrap_or((alarm.hour, alarm.minute));
            let mut draft = AlarmDraft {
                hour,
                minute,
                label: alarm.label.clone(),
                daily_reset: alarm.is_daily_reset,
                max_snooze_count: alarm.max_snooze_count,
                vibration: alarm.vibration_pattern,
                snooze_interval_ms: alarm.snooze_interval_ms,
                work_duration_ms: alarm.work_duration_ms,
                break_duration_ms: alarm.break_duration_ms,
                sound: alarm.sound.clone(),
            };
            options.apply(&mut draft);

            alarm.hour = draft.hour;
            alarm.minute = draft.minute;
            alarm.label = draft.label;
            alarm.is_daily_reset = draft.daily_reset;
            alarm.max_snooze_count = draft.max_snooze_count;
            alarm.vibration_pattern = draft.vibration;
            alarm.snooze_interval_ms = draft.snooze_interval_ms;
            alarm.work_duration_ms = draft.work_duration_ms;
            alarm.break_duration_ms = draft.break_duration_ms;
            alarm.sound = draft.sound;

            let alarm = service.update(alarm)?.ok_or_else(|| not_found(id))?;
            print_json(&alarm)?;
        }
        AlarmAction::Toggle { id } => {
            let alarm = service.toggle(id)?.ok_or_else(|| not_found(id))?;
            print_json(&alarm)?;
        }
        AlarmAction::Enable { id } => {
            let alarm = service.set_enabled(id, true)?.ok_or_else(|| not_found(id))?;
            print_json(&alarm)?;
        }
        AlarmAction::Disable { id } => {
            let alarm = service.set_enabled(id, false)?.ok_or_else(|| not_found(id))?;
            print_json(&alarm)?;
        }
        AlarmAction::Remove { id } => {
            if !service.delete(id)? {
                return Err(not_found(id));
            }
            println!("alarm {id} removed");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wall_clock_times() {
        assert_eq!(parse_time("07:05"), Ok((7, 5)));
        assert_eq!(parse_time("0:0"), Ok((0, 0)));
        assert!(parse_time("24:00").is_err());
        assert!(parse_time("12:60").is_err());
        assert!(parse_time("noon").is_err());
    }

    #[test]
    fn options_override_defaults() {
        let mut draft = AlarmDraft::new(6, 0);
        AlarmOptions {
            label: Some("run".into()),
            daily_reset: Some(true),
            max_snooze: None,
            vibration: Some(VibrationPattern::Short),
            snooze_secs: Some(60),
            work_secs: None,
            break_secs: None,
            sound: Some("NO_SOUND".into()),
        }
        .apply(&mut draft);

        assert_eq!(draft.label, "run");
        assert!(draft.daily_reset);
        assert_eq!(draft.snooze_interval_ms, 60_000);
        assert_eq!(draft.work_duration_ms, 300_000);
        assert_eq!(draft.sound, SoundRef::Silent);
        assert_eq!(draft.vibration, VibrationPattern::Short);
    }
}
