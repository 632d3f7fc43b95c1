use crate::android::binary_xml::BinaryXmlError;
use std::fmt;
use std::io;

/// Result alias for manifest extraction.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors surfaced while pulling properties out of an APK manifest.
#[derive(Debug)]
pub enum ManifestError {
    /// The container has no member with the requested name.
    NotFound(String),
    /// Reading from the container or one of its members failed.
    Io(io::Error),
    /// The container is not a readable ZIP archive.
    Archive(zip::result::ZipError),
    /// The binary XML violates the chunk or element structure.
    MalformedDocument(String),
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::NotFound(name) => write!(f, "{name} not found in archive"),
            ManifestError::Io(err) => write!(f, "I/O error: {err}"),
            ManifestError::Archive(err) => write!(f, "ZIP error: {err}"),
            ManifestError::MalformedDocument(msg) => write!(f, "Malformed manifest: {msg}"),
        }
    }
}

impl std::error::Error for ManifestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ManifestError::Io(err) => Some(err),
            ManifestError::Archive(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ManifestError {
    fn from(value: io::Error) -> Self {
        ManifestError::Io(value)
    }
}

impl From<zip::result::ZipError> for ManifestError {
    fn from(value: zip::result::ZipError) -> Self {
        match value {
            zip::result::ZipError::Io(err) => ManifestError::Io(err),
            other => ManifestError::Archive(other),
        }
    }
}

impl From<BinaryXmlError> for ManifestError {
    fn from(value: BinaryXmlError) -> Self {
        match value {
            BinaryXmlError::MalformedDocument(msg) => ManifestError::MalformedDocument(msg),
        }
    }
}

impl ManifestError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ManifestError::NotFound(_))
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, ManifestError::MalformedDocument(_))
    }
}
