use super::render_toml;
use crate::common::config::AppConfig;
use anyhow::Result;
use std::io::Write;
use std::path::Path;

pub(super) fn write_path(path: &Path, output: &mut dyn Write) -> Result<()> {
    writeln!(output, "{}", path.display())?;
    Ok(())
}

/// Effective config as TOML, prefixed by a comment naming its source.
pub(super) fn write_effective(
    path: &Path,
    config: &AppConfig,
    output: &mut dyn Write,
) -> Result<()> {
    if path.exists() {
        writeln!(output, "# loaded from {}", path.display())?;
    } else {
        writeln!(output, "# no config file at {}; showing defaults", path.display())?;
    }
    output.write_all(render_toml(config)?.as_bytes())?;
    Ok(())
}
