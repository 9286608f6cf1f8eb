use super::commands::Cli;
use sema_node::LoggingConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command-line flags win over the `[logging]` config section; `RUST_LOG`
/// wins over both.
pub fn init_logging(cli: &Cli, logging: &LoggingConfig) -> anyhow::Result<()> {
    let level = if cli.quiet {
        "warn".to_string()
    } else {
        match cli.verbose {
            0 => logging.level.to_string(),
            1 => "info,sema_node=debug,sema_crypto=debug".to_string(),
            2 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    let log_file = cli.log_file.clone().or_else(|| logging.file.clone());
    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| anyhow::anyhow!("Failed to open log file {}: {}", path.display(), e))?;
        let file_layer = fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false);
        if logging.json {
            subscriber.with(file_layer.json()).try_init()?;
        } else {
            subscriber.with(file_layer).try_init()?;
        }
    } else if logging.json {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(cli.verbose >= 2);
        if logging.timestamps {
            subscriber.with(stderr_layer).try_init()?;
        } else {
            subscriber.with(stderr_layer.without_time()).try_init()?;
        }
    }
    Ok(())
}

pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".sema"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/sema"))
}

pub fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn ok(label: &str, detail: impl std::fmt::Display) {
    println!("  {:<24}\x1b[38;5;46mOK\x1b[0m {}", label, detail);
}

pub fn warn_line(label: &str, detail: impl std::fmt::Display) {
    println!("  {:<24}\x1b[38;5;226mWARN\x1b[0m {}", label, detail);
}

pub fn fail(label: &str, detail: impl std::fmt::Display) {
    println!("  {:<24}\x1b[38;5;196mFAIL\x1b[0m {}", label, detail);
}

pub fn heading(title: &str) {
    println!("\x1b[38;5;46m{}\x1b[0m", title);
    println!("\x1b[38;5;245m{}\x1b[0m", "═".repeat(50));
}

pub fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(path)
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", path.display(), e))
}
