use std::path::{Component, Path};

//===============
// Path Handling
//===============
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path contains parent directory (..)")]
    ContainsParentDir,
    #[error("Path is absolute")]
    AbsolutePath,
    #[error("Path contains invalid component")]
    InvalidComponent,
    #[error("Path contains null byte")]
    NullByte,
    #[error("Path is empty")]
    Empty,
}

// Checks for: empty strings, null bytes, parent directory traversal, absolute paths
fn validate_path_components(path_str: &str) -> Result<(), PathValidationError> {
    if path_str.is_empty() {
        return Err(PathValidationError::Empty);
    }

    // \0 would truncate the name at the OS boundary
    if path_str.contains('\0') {
        return Err(PathValidationError::NullByte);
    }

    for component in Path::new(path_str).components() {
        match component {
            Component::Normal(_) | Component::CurDir => continue,
            Component::ParentDir => return Err(PathValidationError::ContainsParentDir),
            Component::RootDir => return Err(PathValidationError::AbsolutePath),
            Component::Prefix(_) => return Err(PathValidationError::InvalidComponent),
        }
    }

    Ok(())
}

/// A single file name with no directory parts.
pub fn validate_filename(filename: &str) -> Result<(), PathValidationError> {
    validate_path_components(filename)?;

    if filename == "." || filename.contains(['/', '\\']) {
        return Err(PathValidationError::InvalidComponent);
    }
    if filename.chars().any(char::is_control) {
        return Err(PathValidationError::InvalidComponent);
    }

    Ok(())
}

/// Reduce a client-supplied upload name to a safe base name.
///
/// Browsers may send full paths (`C:\fakepath\x.txt`) or relative ones, so
/// only the last segment is kept before validation.
pub fn upload_file_name(raw: &str) -> Result<String, PathValidationError> {
    let base = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if base == ".." {
        return Err(PathValidationError::ContainsParentDir);
    }
    validate_filename(base)?;

    Ok(base.to_string())
}
