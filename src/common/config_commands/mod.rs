//! CLI handlers for `ferrydrop config ...`.

mod io;
mod reset;
mod show;

use crate::common::config::{config_path, load_config_from, AppConfig};
use anyhow::{Context, Result};

fn render_toml(config: &AppConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize config")
}

/// Print the config file location.
pub fn run_config_path() -> Result<()> {
    let stdout = std::io::stdout();
    let mut output = stdout.lock();
    show::write_path(&config_path(), &mut output)
}

/// Print the effective configuration after file and environment layers.
pub fn run_config_show() -> Result<()> {
    let path = config_path();
    let config = load_config_from(&path)?;
    let stdout = std::io::stdout();
    let mut output = stdout.lock();
    show::write_effective(&path, &config, &mut output)
}

/// Overwrite the config file with defaults (asks first unless `yes`).
pub fn run_config_reset(yes: bool) -> Result<bool> {
    reset::reset_config(&config_path(), yes)
}
