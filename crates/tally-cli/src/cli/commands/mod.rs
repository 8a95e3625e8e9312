mod export;
mod reconcile;
mod verify;

use std::path::Path;

use anyhow::{Context, Result};
use tally_sync::SyncConfig;

use super::args::{Cli, Command};

pub fn dispatch(cli: Cli) -> Result<i32> {
    let config = load_config(cli.config.as_deref())?;
    match cli.cmd {
        Command::Export(args) => export::cmd_export(&config, args),
        Command::Certs(args) => export::cmd_certs(&config, args),
        Command::Verify(args) => verify::cmd_verify(args),
        Command::Reconcile(args) => reconcile::cmd_reconcile(args),
    }
}

/// YAML file (if any), then `TALLY_*` environment variables.
fn load_config(path: Option<&Path>) -> Result<SyncConfig> {
    let config = match path {
        Some(path) => SyncConfig::from_yaml_file(path)?.merge_env(),
        None => SyncConfig::from_env(),
    };
    tracing::debug!(?config, "Loaded configuration");
    Ok(config)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = std::fs::read(path)
        .with_context(|| format!("failed to read {what} {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("invalid {what} {}", path.display()))
}
