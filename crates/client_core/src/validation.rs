//! Pure upload checks: accepted media type or extension, then the size ceiling.

use crate::error::ValidationError;

pub const ACCEPTED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/bmp",
    "image/tiff",
    "image/gif",
];

/// Checked when the declared media type is missing or not in the list above.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tiff", "gif"];

pub const MAX_FILE_SIZE_BYTES: u64 = 15 * 1024 * 1024;

/// Metadata the validator needs from a candidate upload.
pub trait FileInfo {
    fn name(&self) -> &str;
    fn mime_type(&self) -> &str;
    fn size_bytes(&self) -> u64;
}

/// Metadata-only file description, for callers that have not read the bytes yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes,
        }
    }
}

impl FileInfo for FileDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRules {
    pub accepted_mime_types: &'static [&'static str],
    pub accepted_extensions: &'static [&'static str],
    pub max_size_bytes: u64,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            accepted_mime_types: ACCEPTED_MIME_TYPES,
            accepted_extensions: ACCEPTED_EXTENSIONS,
            max_size_bytes: MAX_FILE_SIZE_BYTES,
        }
    }
}

impl ValidationRules {
    /// Returns the file unchanged when it passes every check.
    pub fn validate<F: FileInfo>(&self, file: F) -> Result<F, ValidationError> {
        if !self.accepts_type(&file) {
            return Err(ValidationError::UnsupportedType {
                mime_type: display_or_unknown(file.mime_type()),
                extension: display_or_unknown(extension_of(file.name())),
            });
        }

        if file.size_bytes() > self.max_size_bytes {
            return Err(ValidationError::TooLarge {
                size_bytes: file.size_bytes(),
                max_bytes: self.max_size_bytes,
            });
        }

        Ok(file)
    }

    fn accepts_type<F: FileInfo>(&self, file: &F) -> bool {
        let mime_type = file.mime_type().trim().to_ascii_lowercase();
        if self.accepted_mime_types.contains(&mime_type.as_str()) {
            return true;
        }

        let name = file.name().to_ascii_lowercase();
        self.accepted_extensions
            .iter()
            .any(|ext| name.strip_suffix(ext).is_some_and(|stem| stem.ends_with('.')))
    }
}

/// Validates against the default rule set.
pub fn validate<F: FileInfo>(file: F) -> Result<F, ValidationError> {
    ValidationRules::default().validate(file)
}

fn extension_of(name: &str) -> &str {
    name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

fn display_or_unknown(value: &str) -> String {
    if value.trim().is_empty() {
        "unknown".to_string()
    } else {
        value.to_ascii_lowercase()
    }
}
