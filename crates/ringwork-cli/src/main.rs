use clap::{Parser, Subcommand};
use ringwork_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "ringwork", version, about = "Ringwork alarm engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Alarm management
    Alarm {
        #[command(subcommand)]
        action: commands::alarm::AlarmAction,
    },
    /// Daily reset of all enabled alarms at midnight
    DailyReset {
        #[command(subcommand)]
        action: commands::daily_reset::DailyResetAction,
    },
    /// Show what a cold start would arm
    Boot,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run the alarm daemon in the foreground
    ///
    /// The daemon loads the alarm list once at start-up and writes the whole
    /// list back on every change. Do not add, edit or remove alarms from a
    /// second `ringwork` process while it runs: the daemon never sees those
    /// changes and overwrites them on its next write. Stop the daemon, make
    /// the change, then start it again.
    Run,
}

/// Log to stderr so stdout stays machine-readable. RUST_LOG wins over the
/// configured filter.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let configured = Config::load_or_default().logging.filter;
        EnvFilter::try_new(configured).unwrap_or_else(|_| EnvFilter::new("info"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Commands::Alarm { action } => commands::alarm::run(action),
        Commands::DailyReset { action } => commands::daily_reset::run(action),
        Commands::Boot => commands::boot::run(),
        Commands::Config { action } => commands::config::run(action),
        Commands::Run => commands::run::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
