//! Filename generation and manipulation.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Validate and sanitize a filename by removing or replacing invalid characters.
///
/// Returns an error if the filename contains path traversal patterns.
pub fn sanitize_filename(name: &str) -> Result<String> {
    // Reject path traversal attempts
    if name.contains("..") {
        return Err(Error::InvalidFilename(format!(
            "Path traversal detected: '{}'",
            name
        )));
    }

    // Also reject if it contains path separators (should be sanitized, not allowed)
    if name.contains('/') || name.contains('\\') {
        return Err(Error::InvalidFilename(format!(
            "Path separators not allowed in filename: '{}'",
            name
        )));
    }

    // Reject null bytes
    if name.contains('\0') {
        return Err(Error::InvalidFilename(format!(
            "Null bytes not allowed in filename: '{}'",
            name
        )));
    }

    // Sanitize remaining problematic characters
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    // Reject empty or whitespace-only names
    if sanitized.trim().is_empty() {
        return Err(Error::InvalidFilename(
            "Filename cannot be empty or whitespace-only".to_string(),
        ));
    }

    Ok(sanitized)
}

/// Sanitize a path component (folder or file name) with less strict validation.
///
/// This is used for creator names and other path components where we want to
/// sanitize rather than reject on certain characters.
pub fn sanitize_path_component(name: &str) -> Result<String> {
    // Reject path traversal attempts
    if name.contains("..") {
        return Err(Error::InvalidFilename(format!(
            "Path traversal detected: '{}'",
            name
        )));
    }

    // Reject null bytes
    if name.contains('\0') {
        return Err(Error::InvalidFilename(format!(
            "Null bytes not allowed: '{}'",
            name
        )));
    }

    // Sanitize problematic characters (replace with underscore)
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    // Reject empty or whitespace-only names
    if sanitized.trim().is_empty() {
        return Err(Error::InvalidFilename(
            "Path component cannot be empty or whitespace-only".to_string(),
        ));
    }

    Ok(sanitized)
}

/// Validate an account name for use as a file stem.
///
/// Account names must already be clean: anything `sanitize_filename` would
/// rewrite, or a leading dot, is rejected rather than silently mapped.
pub fn validate_account_name(account: &str) -> Result<()> {
    let sanitized = sanitize_filename(account)?;
    if sanitized != account || account.starts_with('.') || account.trim() != account {
        return Err(Error::InvalidFilename(format!(
            "Not a valid account name: '{}'",
            account
        )));
    }
    Ok(())
}

/// File stem for a media resource of a post.
///
/// Single-media posts are stored as `<shortcode>`, multi-media posts as
/// `<shortcode>/<index>`.
pub fn media_file_stem(shortcode: &str, index: usize, total: usize) -> Result<PathBuf> {
    let shortcode = sanitize_filename(shortcode)?;
    if total <= 1 {
        Ok(PathBuf::from(shortcode))
    } else {
        Ok(PathBuf::from(shortcode).join(index.to_string()))
    }
}

/// Path of the in-progress download next to `path`.
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}
