mod cli;
mod commands;
mod config;
mod logging;
#[cfg(test)]
mod tests;

use anyhow::Context;
use clap::Parser;
use donor_registry::{FileStore, PatientRepository};
use tracing::debug;

use crate::cli::Cli;
use crate::config::DashboardConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = DashboardConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    logging::init(&config.log_level, config.json_logs)?;

    let store = FileStore::new(&config.data_dir);
    debug!(data_dir = %store.dir().display(), key = %config.state_key, "opening state");
    let mut repo = PatientRepository::open(store, config.repository_options())
        .with_context(|| format!("opening state in {}", config.data_dir.display()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    commands::run(&mut repo, &config, cli.command, cli.json, &mut out)
}
