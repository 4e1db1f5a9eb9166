use super::io::replace_file;
use super::render_toml;
use crate::common::config::AppConfig;
use anyhow::{bail, Result};
use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;

pub(super) fn reset_config(path: &Path, yes: bool) -> Result<bool> {
    let stdin = std::io::stdin();
    let interactive = stdin.is_terminal();
    let mut input = stdin.lock();
    let stdout = std::io::stdout();
    let mut output = stdout.lock();

    reset_with_io(path, yes, interactive, &mut input, &mut output)
}

fn reset_with_io(
    path: &Path,
    yes: bool,
    interactive: bool,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<bool> {
    if !yes {
        if !interactive {
            bail!("Refusing to reset config without a terminal. Pass --yes");
        }
        write!(output, "Overwrite {} with defaults? [y/N]: ", path.display())?;
        output.flush()?;

        let mut answer = String::new();
        input.read_line(&mut answer)?;
        if !matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
            writeln!(output, "Left {} unchanged.", path.display())?;
            return Ok(false);
        }
    }

    replace_file(path, &render_toml(&AppConfig::default())?)?;
    writeln!(output, "Wrote defaults to {}", path.display())?;
    Ok(true)
}
