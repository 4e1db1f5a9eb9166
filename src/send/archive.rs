//! Bundles several inputs (or one directory) into a temporary zip.
//!
//! Unreadable inputs are skipped and reported instead of failing the whole
//! archive. Only failures on the output file itself abort the build.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Display name used when several top-level inputs are bundled.
pub const MULTI_INPUT_NAME: &str = "archive.zip";

/// Generated archive on disk. Removed exactly once: by [`TempArchive::remove`]
/// or, if that never happens, on drop.
#[derive(Debug)]
pub struct TempArchive {
    path: PathBuf,
    removed: bool,
}

impl TempArchive {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn remove(mut self) -> io::Result<()> {
        self.removed = true;
        fs::remove_file(&self.path)
    }
}

impl Drop for TempArchive {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(err) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to remove temp zip archive");
        }
    }
}

/// An input (or a file below one) left out of the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedInput {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug)]
pub struct ArchiveOutput {
    pub archive: TempArchive,
    pub display_name: String,
    /// File entries written (directories not counted)
    pub entries: usize,
    pub skipped: Vec<SkippedInput>,
}

/// Build a zip of `inputs` in the system temp directory.
pub fn build_archive(inputs: &[PathBuf]) -> Result<ArchiveOutput> {
    build_archive_in(&std::env::temp_dir(), inputs)
}

/// Build a zip of `inputs` inside `dir`.
///
/// A single directory input is stored relative to its own root. With several
/// inputs each directory keeps its name as a prefix and each file is stored
/// under its base name.
pub fn build_archive_in(dir: &Path, inputs: &[PathBuf]) -> Result<ArchiveOutput> {
    anyhow::ensure!(!inputs.is_empty(), "No inputs given for zip archive");

    let path = dir.join(format!("ferrydrop-{}.zip", Uuid::new_v4()));
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("Failed to create zip archive {}", path.display()))?;
    // Owned from here on so every early return cleans the file up
    let archive = TempArchive {
        path,
        removed: false,
    };

    let mut builder = ArchiveBuilder::new(file);
    let single_input = inputs.len() == 1;
    for input in inputs {
        builder.add_input(input, single_input);
    }

    let ArchiveBuilder {
        writer,
        files: entries,
        skipped,
        ..
    } = builder;
    writer.finish().context("Failed to finalize zip archive")?;

    tracing::debug!(
        path = %archive.path().display(),
        entries,
        skipped = skipped.len(),
        "zip archive built"
    );

    Ok(ArchiveOutput {
        archive,
        display_name: display_name(inputs),
        entries,
        skipped,
    })
}

/// `<dir>.zip` for a lone directory, [`MULTI_INPUT_NAME`] otherwise.
/// Touches the filesystem, so only call it from blocking code.
fn display_name(inputs: &[PathBuf]) -> String {
    match inputs {
        [single] if single.is_dir() => format!("{}.zip", base_name(single, "archive")),
        _ => MULTI_INPUT_NAME.to_string(),
    }
}

fn base_name(path: &Path, fallback: &str) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            path.canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| fallback.to_string())
}

/// Zip entry name with forward slashes regardless of platform.
fn entry_name(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

struct ArchiveBuilder {
    writer: ZipWriter<File>,
    names: HashSet<PathBuf>,
    files: usize,
    skipped: Vec<SkippedInput>,
}

impl ArchiveBuilder {
    fn new(file: File) -> Self {
        Self {
            writer: ZipWriter::new(file),
            names: HashSet::new(),
            files: 0,
            skipped: Vec::new(),
        }
    }

    fn add_input(&mut self, input: &Path, single_input: bool) {
        let metadata = match fs::metadata(input) {
            Ok(metadata) => metadata,
            Err(err) => return self.skip(input, err.to_string()),
        };

        if metadata.is_dir() {
            let prefix = if single_input {
                PathBuf::new()
            } else {
                let wanted = PathBuf::from(base_name(input, "dir"));
                let prefix = self.unique_name(&wanted);
                self.add_directory(&prefix);
                prefix
            };
            self.add_tree(input, &prefix);
        } else {
            let wanted = PathBuf::from(base_name(input, "file"));
            let name = self.unique_name(&wanted);
            self.add_file(input, &name, metadata.len());
        }
    }

    /// Depth-first walk below `root`. Symlinks are not followed into
    /// directories, so link cycles cannot recurse.
    fn add_tree(&mut self, root: &Path, prefix: &Path) {
        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().unwrap_or(root).to_path_buf();
                    self.skip(&path, err.to_string());
                    continue;
                }
            };

            let relative = match entry.path().strip_prefix(root) {
                Ok(relative) => relative,
                Err(_) => continue,
            };
            let name = prefix.join(relative);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                self.add_directory(&name);
            } else if file_type.is_file() {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                self.add_file(entry.path(), &name, size);
            } else if file_type.is_symlink() {
                match fs::metadata(entry.path()) {
                    Ok(target) if target.is_file() => {
                        self.add_file(entry.path(), &name, target.len())
                    }
                    Ok(_) => self.skip(entry.path(), "symlinked directory not followed".into()),
                    Err(err) => self.skip(entry.path(), err.to_string()),
                }
            }
        }
    }

    fn add_directory(&mut self, name: &Path) {
        let mut dir_name = entry_name(name);
        if dir_name.is_empty() {
            return;
        }
        dir_name.push('/');
        if let Err(err) = self.writer.add_directory(dir_name, SimpleFileOptions::default()) {
            self.skip(name, err.to_string());
        }
    }

    fn add_file(&mut self, source_path: &Path, name: &Path, size: u64) {
        // Open first so an unreadable file never leaves a dangling entry
        let mut source = match File::open(source_path) {
            Ok(source) => source,
            Err(err) => return self.skip(source_path, err.to_string()),
        };

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(size >= u64::from(u32::MAX));

        if let Err(err) = self.writer.start_file(entry_name(name), options) {
            return self.skip(source_path, err.to_string());
        }

        if let Err(err) = io::copy(&mut source, &mut self.writer) {
            if let Err(abort_err) = self.writer.abort_file() {
                tracing::warn!(error = %abort_err, "failed to drop partial zip entry");
            }
            return self.skip(source_path, err.to_string());
        }

        self.files += 1;
    }

    fn unique_name(&mut self, wanted: &Path) -> PathBuf {
        if self.names.insert(wanted.to_path_buf()) {
            return wanted.to_path_buf();
        }

        let stem = wanted
            .file_stem()
            .map(|x| x.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let ext = wanted.extension().map(|x| x.to_string_lossy().into_owned());

        let mut idx = 2usize;
        loop {
            let candidate = PathBuf::from(match &ext {
                Some(ext) if !ext.is_empty() => format!("{stem}-{idx}.{ext}"),
                _ => format!("{stem}-{idx}"),
            });
            if self.names.insert(candidate.clone()) {
                return candidate;
            }
            idx += 1;
        }
    }

    fn skip(&mut self, path: &Path, reason: String) {
        tracing::warn!(path = %path.display(), reason, "leaving input out of archive");
        self.skipped.push(SkippedInput {
            path: path.to_path_buf(),
            reason,
        });
    }
}
