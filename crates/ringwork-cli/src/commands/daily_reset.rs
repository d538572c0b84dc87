use std::error::Error;

use clap::Subcommand;

use super::{open_service, print_json};

#[derive(Subcommand)]
pub enum DailyResetAction {
    /// Re-arm every enabled alarm each midnight
    On,
    /// Stop the midnight re-arm
    Off,
    /// Show whether the daily reset is on
    Status,
}

pub fn run(action: DailyResetAction) -> Result<(), Box<dyn Error>> {
    let service = open_service()?;
    let status = match action {
        DailyResetAction::On => {
            let next = service.set_daily_reset_enabled(true)?;
            serde_json::json!({ "enabled": true, "next_reset_at": next })
        }
        DailyResetAction::Off => {
            service.set_daily_reset_enabled(false)?;
            serde_json::json!({ "enabled": false, "next_reset_at": null })
        }
        DailyResetAction::Status => {
            serde_json::json!({ "enabled": service.daily_reset_enabled()? })
        }
    };
    print_json(&status)
}
