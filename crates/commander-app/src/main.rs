//! Commander application binary - composition root.
//!
//! 1. Resolve and load settings (TOML)
//! 2. Initialize logging
//! 3. Load the startup session config, if any
//! 4. Build the command registry and register the demo commands
//! 5. Run the interactive session on a blocking thread until `quit`

mod cli;
mod session;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use commander_action::{Commands, Scanner, StdinScanner};
use commander_core::{paths, SessionConfig, Settings, SharedConfig};

use cli::CliArgs;

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Load the startup session config, falling back to an empty one.
fn startup_config(raw: Option<String>) -> SessionConfig {
    let Some(raw) = raw else {
        return SessionConfig::default();
    };
    match paths::normalize(&raw).and_then(|path| SessionConfig::load(&path)) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %raw, error = %e, "Failed to load startup session config");
            SessionConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Settings come first so their log level can configure tracing.
    let settings_path = args.resolve_settings_path();
    let settings = Settings::load_or_default(&settings_path);
    init_tracing(&args.resolve_log_level(&settings.general.log_level));

    tracing::info!("Starting commander v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %settings_path.display(), "Settings resolved");

    let config = SharedConfig::new(startup_config(
        args.resolve_startup_config(settings.session.startup_config.as_deref()),
    ));

    let scanner: Arc<dyn Scanner> = Arc::new(StdinScanner);
    let commands = Commands::with_capacity(config, settings.queue.capacity, Arc::clone(&scanner))?;
    session::register_demo(
        &commands,
        Duration::from_secs(settings.watch.interval_secs),
    );

    let printer = tokio::spawn(session::print_events(commands.subscribe()));

    let session_commands = commands.clone();
    let prompt = settings.session.prompt.clone();
    let end = tokio::task::spawn_blocking(move || {
        session::run(&session_commands, scanner.as_ref(), &prompt)
    })
    .await?;
    tracing::info!(?end, "Session ended");

    commands.close();
    printer.abort();
    Ok(())
}
