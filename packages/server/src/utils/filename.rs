/// Why an uploaded filename was refused.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum FilenameError {
    #[error("Filename cannot be empty")]
    Empty,
    #[error("Invalid filename: path separators are not allowed")]
    ContainsPathSeparator,
    #[error("Invalid filename: '..' is not allowed")]
    PathTraversal,
    #[error("Invalid filename: hidden files (starting with '.') are not allowed")]
    Hidden,
    /// Includes NUL; CR/LF would allow header injection in Content-Disposition.
    #[error("Invalid filename: control characters are not allowed")]
    ControlCharacter,
    #[error("Filename exceeds maximum length of 255 characters")]
    TooLong,
}

/// Validates a flat upload filename (no directory components) and returns
/// it trimmed.
pub fn validate_upload_filename(filename: &str) -> Result<&str, FilenameError> {
    let trimmed = filename.trim();

    if trimmed.is_empty() {
        return Err(FilenameError::Empty);
    }
    if trimmed.chars().count() > 255 {
        return Err(FilenameError::TooLong);
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(FilenameError::ControlCharacter);
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(FilenameError::ContainsPathSeparator);
    }
    if trimmed == ".." {
        return Err(FilenameError::PathTraversal);
    }
    if trimmed.starts_with('.') {
        return Err(FilenameError::Hidden);
    }

    Ok(trimmed)
}

/// Parses a compo format list such as `"zip|7z|tar.gz"`.
pub fn parse_formats(formats: &str) -> Vec<String> {
    formats
        .split('|')
        .map(|f| f.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|f| !f.is_empty())
        .collect()
}

/// Checks a filename against a compo format list. Multi-part extensions
/// (`tar.gz`) match by suffix. An empty list accepts nothing.
pub fn has_allowed_extension(filename: &str, formats: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    parse_formats(formats).iter().any(|ext| {
        lower
            .strip_suffix(ext.as_str())
            .is_some_and(|rest| rest.len() > 1 && rest.ends_with('.'))
    })
}

/// Normalizes a format list for storage, rejecting unusable input.
pub fn normalize_formats(formats: &str) -> Result<String, &'static str> {
    let parsed = parse_formats(formats);
    if parsed.is_empty() {
        return Err("Format list must contain at least one extension");
    }
    if parsed
        .iter()
        .any(|ext| !ext.chars().all(|c| c.is_ascii_alphanumeric() || c == '.'))
    {
        return Err("Extensions may only contain letters, digits and '.'");
    }
    Ok(parsed.join("|"))
}
