//! synd-run - Publish the latest article to every configured platform
//!
//! Runs one publication pipeline per platform, in order, and exits with a
//! status that tells schedulers how the run went.

use clap::{Parser, ValueEnum};
use libsyndicast::config::load_dotenv;
use libsyndicast::error::ConfigError;
use libsyndicast::events::EventBus;
use libsyndicast::logging::{LogFormat, LoggingConfig};
use libsyndicast::{Config, PlatformKind, Result, RunCoordinator, SyndicastError};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "synd-run")]
#[command(version)]
#[command(about = "Publish the latest article to every configured platform")]
#[command(long_about = "\
synd-run - Publish the latest article to every configured platform

DESCRIPTION:
    For each platform in run order, synd-run selects the newest article not
    yet posted there, generates platform-specific copy, publishes it and
    records the posted marker. Platforms run one at a time with a pause
    between them; one platform failing does not stop the others.

USAGE:
    # Run every configured platform
    synd-run

    # Only some platforms (kept in configured order)
    synd-run --platform twitter,reddit

    # Stream progress events as JSON lines
    synd-run --format json

SIGNALS:
    SIGTERM, SIGINT - Stop before the next platform; the current one finishes

CONFIGURATION:
    Configuration file: ~/.config/syndicast/config.toml (or SYNDICAST_CONFIG)
    Credentials may also come from the environment or a .env file:
    NEXT_PUBLIC_SUPABASE_URL, NEXT_PUBLIC_SUPABASE_ANON_KEY, OPENAI_API_KEY,
    TWITTER_BEARER_TOKEN, LINKEDIN_ACCESS_TOKEN, FACEBOOK_ACCESS_TOKEN,
    FACEBOOK_PAGE_ID, REDDIT_CLIENT_ID, REDDIT_CLIENT_SECRET,
    REDDIT_USERNAME, REDDIT_PASSWORD

EXIT CODES:
    0 - Every platform succeeded (or had nothing to post)
    1 - Some or all platforms failed
    2 - Configuration error
")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Only run these platforms (comma-separated)
    #[arg(short, long, value_name = "LIST")]
    platform: Option<String>,

    /// Output format for the run summary
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Log format: text, json or pretty (overrides SYNDICAST_LOG_FORMAT)
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // .env may carry SYNDICAST_LOG_* settings
    let dotenv = load_dotenv();
    LoggingConfig::from_env(cli.log_format, cli.verbose).init();
    match dotenv {
        Ok(Some(path)) => tracing::debug!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
    }

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = match &cli.config {
        Some(path) => Config::load_with_path(path)?,
        None => Config::load()?,
    };

    if let Some(list) = &cli.platform {
        config.run.platforms = restrict_platforms(&config.run.platforms, list)?;
    }

    config.validate()?;

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let events = EventBus::default();
    let coordinator = RunCoordinator::from_config(&config)
        .await?
        .with_events(events.clone())
        .with_shutdown(shutdown);

    let printer = match cli.format {
        OutputFormat::Json => Some(tokio::spawn(print_events(events.subscribe()))),
        OutputFormat::Text => None,
    };
    drop(events);

    let report = coordinator.run_all().await;
    drop(coordinator);

    if let Some(printer) = printer {
        // Ends once the coordinator's event bus is gone
        let _ = printer.await;
        let json = serde_json::to_string(&report)
            .map_err(|e| SyndicastError::InvalidInput(format!("Failed to encode report: {}", e)))?;
        println!("{}", json);
    } else {
        println!("{}", report);
    }

    Ok(report.exit_code())
}

/// Keep the configured order, dropping platforms not asked for
fn restrict_platforms(configured: &[PlatformKind], list: &str) -> Result<Vec<PlatformKind>> {
    let requested = PlatformKind::parse_list(list)?;
    if requested.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "--platform".to_string(),
            reason: "no platforms given".to_string(),
        }
        .into());
    }
    if let Some(missing) = requested.iter().find(|p| !configured.contains(*p)) {
        return Err(ConfigError::InvalidValue {
            field: "--platform".to_string(),
            reason: format!("{} is not in run.platforms", missing),
        }
        .into());
    }

    Ok(configured
        .iter()
        .copied()
        .filter(|p| requested.contains(p))
        .collect())
}

async fn print_events(mut receiver: libsyndicast::events::EventReceiver) {
    use tokio::sync::broadcast::error::RecvError;

    loop {
        match receiver.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("Failed to encode event: {}", e),
            },
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!("Event stream lagged, {} event(s) dropped", missed);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Set up signal handlers for a graceful stop between platforms
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;
    use std::sync::atomic::Ordering;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| SyndicastError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            tracing::warn!("Received shutdown signal, stopping after the current platform");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restrict_platforms_keeps_configured_order() {
        let configured = PlatformKind::ALL.to_vec();
        let subset = restrict_platforms(&configured, "reddit,twitter").unwrap();
        assert_eq!(subset, vec![PlatformKind::Twitter, PlatformKind::Reddit]);
    }

    #[test]
    fn test_restrict_platforms_rejects_unconfigured() {
        let configured = vec![PlatformKind::Twitter];
        let err = restrict_platforms(&configured, "facebook").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("facebook is not in run.platforms"));
    }

    #[test]
    fn test_restrict_platforms_rejects_empty_and_unknown() {
        let configured = PlatformKind::ALL.to_vec();
        assert!(restrict_platforms(&configured, " , ").is_err());
        assert!(restrict_platforms(&configured, "myspace").is_err());
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "synd-run",
            "--config",
            "/tmp/c.toml",
            "-p",
            "twitter",
            "-f",
            "json",
            "--log-format",
            "pretty",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert_eq!(cli.platform.as_deref(), Some("twitter"));
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.log_format, Some(LogFormat::Pretty));
        assert!(cli.verbose);
    }
}
