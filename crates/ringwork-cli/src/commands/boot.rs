use std::error::Error;

use super::{open_service, print_json};

/// Run the cold-start hook against an in-memory timer and print what it
/// armed. Trigger instants are recomputed and saved as a side effect.
pub fn run() -> Result<(), Box<dyn Error>> {
    let service = open_service()?;
    let report = service.cold_start()?;
    print_json(&report)
}
