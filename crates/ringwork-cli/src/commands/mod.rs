pub mod alarm;
pub mod boot;
pub mod config;
pub mod daily_reset;
pub mod run;

use std::error::Error;
use std::sync::Arc;

use ringwork_core::{AlarmService, Config, Database, LogSink, MemoryWakeTimer, SystemClock};
use serde::Serialize;

/// Open the configured alarm database.
pub fn open_database() -> Result<Arc<Database>, Box<dyn Error>> {
    let config = Config::load_or_default();
    Ok(Arc::new(Database::open_at(&config.database_path()?)?))
}

/// Service for one-shot commands.
///
/// Wake requests go to an in-memory timer and are dropped on exit; the
/// daemon re-arms everything from storage when it starts.
pub fn open_service() -> Result<AlarmService, Box<dyn Error>> {
    let service = AlarmService::open(
        open_database()?,
        Arc::new(MemoryWakeTimer::new()),
        Arc::new(SystemClock),
        Arc::new(LogSink),
    )?;
    Ok(service)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
