//! Local file checks applied before anything is uploaded.

use crate::error::ValidationError;

/// Extensions the scan service accepts, lowercase and without the dot.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jar", "class", "zip"];

/// Largest file the scan service accepts: 50 MiB.
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Validation rules for candidate files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationLimits {
    /// Accepted extensions, lowercase, no leading dot.
    pub allowed_extensions: Vec<String>,
    /// Maximum size in bytes (inclusive).
    pub max_file_size: u64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            allowed_extensions: ALLOWED_EXTENSIONS.iter().map(|e| (*e).to_owned()).collect(),
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

impl ValidationLimits {
    fn allows(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }

    fn allowed_display(&self) -> String {
        self.allowed_extensions
            .iter()
            .map(|e| format!(".{e}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The substring after the last `.` of a filename, if it is non-empty.
#[must_use]
pub fn extension_of(name: &str) -> Option<&str> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

/// Check a file's name and size against `limits`.
///
/// # Errors
///
/// Returns the first rule the file breaks: extension before size.
pub fn validate_file(name: &str, size: u64, limits: &ValidationLimits) -> Result<(), ValidationError> {
    let Some(extension) = extension_of(name) else {
        return Err(ValidationError::MissingExtension {
            name: name.to_owned(),
            allowed: limits.allowed_display(),
        });
    };

    if !limits.allows(extension) {
        return Err(ValidationError::UnsupportedExtension {
            extension: extension.to_owned(),
            allowed: limits.allowed_display(),
        });
    }

    if size > limits.max_file_size {
        return Err(ValidationError::TooLarge {
            size,
            max: limits.max_file_size,
        });
    }

    Ok(())
}
