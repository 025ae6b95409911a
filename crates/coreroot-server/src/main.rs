use std::env;

use anyhow::Context;
use coreroot_server::ServerBuilder;
use coreroot_server::config::loader::{DEFAULT_CONFIG_FILE, load_config};

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From COREROOT_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (coreroot.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (COREROOT_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; anything other than a missing file is worth a warning.
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    coreroot_server::observability::init_tracing();

    let (config_path, source) = resolve_config_path();
    let cfg = load_config(Some(&config_path)).context("configuration error")?;

    tracing::info!(
        path = %config_path,
        source = %source,
        "Configuration loaded"
    );
    coreroot_server::observability::apply_logging_level(&cfg.logging.level);

    let server = ServerBuilder::new()
        .with_config(cfg)
        .build()
        .await
        .context("server initialization failed")?;

    server.run().await.context("server error")?;
    Ok(())
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: COREROOT_CONFIG
/// 3. Default: coreroot.toml
fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, ConfigSource::CliArgument);
            }
        }
    }

    if let Ok(path) = env::var("COREROOT_CONFIG") {
        if !path.is_empty() {
            return (path, ConfigSource::EnvironmentVariable);
        }
    }

    (DEFAULT_CONFIG_FILE.to_string(), ConfigSource::Default)
}
