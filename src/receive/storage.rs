//! Writing uploaded files into the save directory.

use anyhow::{Context, Result};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Upper bound on `name (n).ext` candidates tried for one upload.
const MAX_SUFFIX: u32 = 10_000;

/// Split `file.tar.gz` into (`file`, `.tar.gz`). Hidden files keep their
/// whole name as the base.
fn split_name(filename: &str) -> (&str, &str) {
    match filename.find('.') {
        Some(0) | None => (filename, ""),
        Some(dot) => filename.split_at(dot),
    }
}

/// Candidate name for the `n`th collision, continuing an existing
/// `name (k)` counter when the client already sent one.
fn candidate_name(filename: &str, attempt: u32) -> String {
    if attempt == 0 {
        return filename.to_string();
    }
    let (base, extensions) = split_name(filename);

    let (stem, start) = match base.rfind(" (") {
        Some(paren) if base.ends_with(')') => match base[paren + 2..base.len() - 1].parse::<u32>() {
            Ok(num) => (&base[..paren], num),
            Err(_) => (base, 0),
        },
        _ => (base, 0),
    };

    format!("{stem} ({}){extensions}", start + attempt)
}

/// Create a new file named `filename` in `dir`, or the first free
/// `name (n).ext` variant. Uses `create_new`, so concurrent uploads of the
/// same name never share a file.
pub async fn create_unique(dir: &Path, filename: &str) -> Result<(PathBuf, File)> {
    for attempt in 0..=MAX_SUFFIX {
        let path = dir.join(candidate_name(filename, attempt));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to create {}", path.display()))
            }
        }
    }
    anyhow::bail!("No free file name for {filename} in {}", dir.display())
}

/// An upload being written to disk.
///
/// RAII: unless [`IncomingFile::commit`] ran, Drop deletes the partial file.
pub struct IncomingFile {
    path: PathBuf,
    file: File,
    written: u64,
    committed: bool,
}

impl IncomingFile {
    pub async fn create(dir: &Path, filename: &str) -> Result<Self> {
        let (path, file) = create_unique(dir, filename).await?;
        tracing::debug!(path = %path.display(), "receiving upload");
        Ok(Self {
            path,
            file,
            written: 0,
            committed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.file
            .write_all(chunk)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush to disk and keep the file. Returns its final path and size.
    pub async fn commit(mut self) -> Result<(PathBuf, u64)> {
        self.file.flush().await.context("Failed to flush upload")?;
        self.file
            .sync_all()
            .await
            .context("Failed to sync upload to disk")?;
        self.committed = true;
        Ok((self.path.clone(), self.written))
    }
}

impl Drop for IncomingFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed partial upload"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to remove partial upload")
            }
        }
    }
}
