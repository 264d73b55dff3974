use crate::config::UploadConfig;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No file extension")]
    MissingExtension,
    #[error("File extension '{0}' not allowed")]
    ExtensionNotAllowed(String),
    #[error("MIME type '{0}' not allowed")]
    MimeNotAllowed(String),
    #[error("File exceeds the maximum size of {max} bytes")]
    TooLarge { size: usize, max: usize },
    #[error("File is empty")]
    Empty,
}

pub fn validate_image_file(
    config: &UploadConfig,
    filename: &str,
    content_type: &str,
    size: usize,
) -> Result<(), ValidationError> {
    let (_, extension) = filename
        .rsplit_once('.')
        .ok_or(ValidationError::MissingExtension)?;
    let extension = extension.to_lowercase();

    if !config
        .allowed_extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
    {
        return Err(ValidationError::ExtensionNotAllowed(extension));
    }

    if !config
        .allowed_mime_types
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(content_type))
    {
        return Err(ValidationError::MimeNotAllowed(content_type.to_string()));
    }

    if size == 0 {
        return Err(ValidationError::Empty);
    }

    if size > config.max_file_size {
        return Err(ValidationError::TooLarge {
            size,
            max: config.max_file_size,
        });
    }

    Ok(())
}

/// Reduces an uploaded name to ASCII letters, digits, `.`, `-` and `_`
/// with no leading dots, so it can never escape the upload directory.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();

    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
