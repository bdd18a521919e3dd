//! Tinyseed - seed nodes for every chain in a chain directory
//!
//! Fetches the chain list, then runs one seed-mode peer exchange node per
//! chain on consecutive ports until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tinyseed_config::BaseSettings;
use tinyseed_node::{Orchestrator, Shutdown};
use tinyseed_registry::HttpChainDirectory;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn build_cli() -> Command {
    Command::new("tinyseed")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Seed nodes for every chain in the chain directory")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("TOML file with base settings")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("home")
                .long("home")
                .value_name("DIR")
                .help("Root of the per-chain directories [default: ~/.tinyseed]")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("registry")
                .long("registry")
                .value_name("URL")
                .help("Chain directory base URL"),
        )
        .arg(
            Arg::new("base-port")
                .long("base-port")
                .value_name("PORT")
                .help("Port of the first chain; the others count up from it")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("listen-host")
                .long("listen-host")
                .value_name("HOST")
                .help("Host every seed binds to"),
        )
        .arg(
            Arg::new("no-strict")
                .long("no-strict")
                .help("Accept non-routable addresses (private or local networks)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log filter used when RUST_LOG is unset"),
        )
        .arg(
            Arg::new("chain")
                .long("chain")
                .value_name("CHAIN_ID")
                .help("Only seed this chain (repeatable)")
                .action(ArgAction::Append),
        )
}

/// Settings file first, then command line overrides
fn load_settings(matches: &ArgMatches) -> Result<BaseSettings> {
    let mut settings = match matches.get_one::<PathBuf>("config") {
        Some(path) => BaseSettings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => BaseSettings::default(),
    };

    if let Some(home) = matches.get_one::<PathBuf>("home") {
        settings.home_root = home.clone();
    }
    if let Some(url) = matches.get_one::<String>("registry") {
        settings.registry_url = url.clone();
    }
    if let Some(port) = matches.get_one::<u16>("base-port") {
        settings.base_port = *port;
    }
    if let Some(host) = matches.get_one::<String>("listen-host") {
        settings.listen_host = host.clone();
    }
    if matches.get_flag("no-strict") {
        settings.addr_book_strict = false;
    }
    if let Some(level) = matches.get_one::<String>("log-level") {
        settings.log_level = level.clone();
    }

    settings.validate().context("invalid settings")?;
    Ok(settings)
}

fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level '{}'", level))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn wait_for_signal() -> Result<&'static str> {
    #[cfg(unix)]
    {
        let mut term_signal = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("failed to listen for Ctrl+C")?;
                Ok("Ctrl+C")
            }
            _ = term_signal.recv() => Ok("SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.context("failed to listen for Ctrl+C")?;
        Ok("Ctrl+C")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let settings = load_settings(&matches)?;
    init_logging(&settings.log_level)?;

    let chains: Vec<String> = matches
        .get_many::<String>("chain")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    info!("🚀 Starting tinyseed {}", env!("CARGO_PKG_VERSION"));
    info!(
        registry = %settings.registry_url,
        home = %settings.home_root.display(),
        listen_host = %settings.listen_host,
        base_port = settings.base_port,
        strict = settings.addr_book_strict,
        "configuration"
    );

    let directory = HttpChainDirectory::new(
        &settings.registry_url,
        settings.registry_timeout(),
        settings.registry_retries,
    )
    .context("failed to create registry client")?;

    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match wait_for_signal().await {
                Ok(name) => info!("📶 Received shutdown signal ({})", name),
                Err(e) => warn!("signal handling failed, shutting down: {:#}", e),
            }
            shutdown.trigger("signal");
        });
    }

    let orchestrator =
        Orchestrator::new(settings, Arc::new(directory), shutdown).with_chain_filter(chains);
    let report = match orchestrator.run().await {
        Ok(report) => report,
        Err(e) => {
            error!("❌ could not fetch the chain list: {}", e);
            return Err(e).context("failed to fetch the chain list");
        }
    };

    for failure in report.failures() {
        warn!(chain = failure.chain_id(), "{}", failure);
    }
    info!(
        launched = report.launched(),
        failed = report.failed(),
        "✅ tinyseed stopped"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_defaults() {
        let matches = build_cli()
            .try_get_matches_from([
                "tinyseed",
                "--home",
                "/tmp/seeds",
                "--base-port",
                "19000",
                "--no-strict",
                "--chain",
                "cosmoshub-4",
                "--chain",
                "osmosis-1",
            ])
            .unwrap();
        let settings = load_settings(&matches).unwrap();

        assert_eq!(settings.home_root, PathBuf::from("/tmp/seeds"));
        assert_eq!(settings.base_port, 19000);
        assert!(!settings.addr_book_strict);
        assert_eq!(settings.listen_host, "0.0.0.0");

        let chains: Vec<&String> = matches.get_many::<String>("chain").unwrap().collect();
        assert_eq!(chains, vec!["cosmoshub-4", "osmosis-1"]);
    }

    #[test]
    fn test_cli_rejects_bad_port() {
        assert!(build_cli()
            .try_get_matches_from(["tinyseed", "--base-port", "70000"])
            .is_err());
    }

    #[test]
    fn test_config_file_then_flags() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tinyseed.toml");
        std::fs::write(&path, "base_port = 12000\nlisten_host = \"127.0.0.1\"\n").unwrap();

        let matches = build_cli()
            .try_get_matches_from([
                "tinyseed",
                "--config",
                path.to_str().unwrap(),
                "--listen-host",
                "10.0.0.1",
            ])
            .unwrap();
        let settings = load_settings(&matches).unwrap();
        assert_eq!(settings.base_port, 12000);
        assert_eq!(settings.listen_host, "10.0.0.1");
    }
}
