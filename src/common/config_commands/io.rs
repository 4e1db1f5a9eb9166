use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Replace `path` with `contents` via a synced sibling temp file and rename.
pub(super) fn replace_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }

    let staging = staging_path(path);
    let mut file = fs::File::create(&staging)
        .with_context(|| format!("Failed to create {}", staging.display()))?;
    file.write_all(contents.as_bytes())
        .and_then(|_| file.sync_all())
        .with_context(|| format!("Failed to write {}", staging.display()))?;
    drop(file);

    if let Err(err) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(err)
            .with_context(|| format!("Failed to replace config file {}", path.display()));
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let base_name = path
        .file_name()
        .and_then(|x| x.to_str())
        .unwrap_or("config.toml");
    path.with_file_name(format!(".{base_name}.{}.tmp", Uuid::new_v4()))
}
