/// Input validation helpers shared by the forms
use validator::ValidationError;

use crate::models::POST_IMAGE_PREFIX;

/// Longest stored image path (column width).
pub const MAX_IMAGE_PATH_LEN: usize = 255;

/// Rejects empty and whitespace-only text.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("required");
        error.message = Some("This field is required.".into());
        Err(error)
    } else {
        Ok(())
    }
}

/// Group slugs: ASCII letters, digits, hyphens and underscores.
pub fn validate_slug(value: &str) -> Result<(), ValidationError> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        let mut error = ValidationError::new("invalid_slug");
        error.message =
            Some("Enter a valid slug of letters, numbers, underscores or hyphens.".into());
        Err(error)
    }
}

/// Stored form of an uploaded image name: `posts/<file name>`.
///
/// Any directory part the client sent is dropped. Returns None when no file
/// name is left.
pub fn normalize_image_path(raw: &str) -> Option<String> {
    let file_name = raw
        .trim()
        .rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())?;

    Some(format!("{}{}", POST_IMAGE_PREFIX, file_name))
}
