//! Foreground daemon.
//!
//! Re-arms every enabled alarm on an in-process timer, then loops over three
//! inputs: due wake events, engine events (printed as one JSON object per
//! line), and commands read from stdin:
//!
//! ```text
//! dismiss <id>
//! snooze <id>
//! list
//! quit
//! ```
//!
//! The daemon is the only writer while it runs. Alarm edits made by another
//! process are not picked up and are lost on the daemon's next save.

use std::error::Error;
use std::sync::Arc;

use ringwork_core::{
    AlarmId, AlarmRegistry, AlarmService, AlarmStore, Clock, Event, LogSink,
    RingingSessionController, SystemClock, TokioWakeTimer, WakeScheduler,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::open_database;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DaemonCommand {
    Dismiss(AlarmId),
    Snooze(AlarmId),
    List,
    Quit,
}

impl DaemonCommand {
    fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or("empty command")?;
        let id = |arg: Option<&str>| -> Result<AlarmId, String> {
            let arg = arg.ok_or_else(|| format!("{verb} needs an alarm id"))?;
            arg.parse().map_err(|_| format!("invalid alarm id '{arg}'"))
        };
        let command = match verb.to_ascii_lowercase().as_str() {
            "dismiss" => DaemonCommand::Dismiss(id(words.next())?),
            "snooze" => DaemonCommand::Snooze(id(words.next())?),
            "list" => DaemonCommand::List,
            "quit" | "exit" => DaemonCommand::Quit,
            other => return Err(format!("unknown command '{other}'")),
        };
        Ok(command)
    }
}

fn print_event(event: &Event) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(daemon())
}

async fn daemon() -> Result<(), Box<dyn Error>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (timer, mut wakes) = TokioWakeTimer::new(Arc::clone(&clock))?;
    let (events_tx, mut events) = mpsc::unbounded_channel();

    let registry = Arc::new(AlarmRegistry::open(AlarmStore::new(open_database()?), clock)?);
    let scheduler = WakeScheduler::new(Arc::new(timer));
    let sessions = Arc::new(
        RingingSessionController::new(Arc::clone(&registry), scheduler.clone(), Arc::new(LogSink))
            .with_events(events_tx),
    );
    let service = AlarmService::new(registry, scheduler, sessions);

    let report = service.cold_start()?;
    info!(
        armed = report.armed.len(),
        daily_reset = ?report.daily_reset_at,
        "daemon started"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
            Some(wake) = wakes.recv() => {
                match service.dispatch(wake.alarm_id) {
                    Ok(dispatch) => {
                        let now = service.registry().clock().now_utc();
                        if let Some(event) = dispatch.event(now) {
                            print_event(&event)?;
                        }
                    }
                    Err(e) => error!(alarm_id = wake.alarm_id, error = %e, "wake dispatch failed"),
                }
            }
            Some(event) = events.recv() => print_event(&event)?,
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    stdin_open = false;
                    continue;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match DaemonCommand::parse(&line) {
                    Ok(DaemonCommand::Quit) => break,
                    Ok(command) => handle(&service, command)?,
                    Err(e) => warn!("{e}"),
                }
            }
        }
    }
    Ok(())
}

fn handle(service: &AlarmService, command: DaemonCommand) -> Result<(), Box<dyn Error>> {
    let result = match command {
        DaemonCommand::Dismiss(id) => service.dismiss(id),
        DaemonCommand::Snooze(id) => service.snooze(id),
        DaemonCommand::List => {
            println!("{}", serde_json::to_string(&service.list())?);
            return Ok(());
        }
        DaemonCommand::Quit => return Ok(()),
    };
    // Resolved sessions publish their events on the channel.
    match result {
        Ok(Some(_)) => {}
        Ok(None) => warn!(?command, "alarm is not ringing"),
        Err(e) => error!(?command, error = %e, "command failed"),
    }
    Ok(())
}
