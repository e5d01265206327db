use std::fmt;
use std::path::Path;

use chrono::Utc;

use super::error::StorageError;

/// Longest extension carried over from an uploaded filename, dot excluded.
const MAX_EXTENSION_LEN: usize = 16;

/// A validated flat filename addressing one blob in a [`BlobStore`](super::BlobStore).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BlobName(String);

impl BlobName {
    /// Generate a fresh name for an upload.
    ///
    /// Layout: `{unix millis}-{random 0..1e9}{.ext}`, where `.ext` is the
    /// extension of `original` when it is short and alphanumeric. The
    /// timestamp plus random suffix makes collisions unlikely enough that no
    /// lookup is performed.
    pub fn generate(original: &str) -> Self {
        let millis = Utc::now().timestamp_millis();
        let suffix = rand::random::<u32>() % 1_000_000_000;
        let ext = safe_extension(original)
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        Self(format!("{millis}-{suffix}{ext}"))
    }

    /// Parse a stored name, rejecting anything that could escape the store
    /// directory.
    pub fn parse(name: &str) -> Result<Self, StorageError> {
        if name.is_empty() {
            return Err(StorageError::InvalidName("name cannot be empty".into()));
        }
        if name.contains('\0') || name.chars().any(|c| c.is_ascii_control()) {
            return Err(StorageError::InvalidName(
                "control characters are not allowed".into(),
            ));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(StorageError::InvalidName(
                "path separators are not allowed".into(),
            ));
        }
        if name.starts_with('.') {
            return Err(StorageError::InvalidName(
                "hidden names (and '..') are not allowed".into(),
            ));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extension without the leading dot, if any.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.0).extension().and_then(|e| e.to_str())
    }
}

fn safe_extension(original: &str) -> Option<&str> {
    let ext = Path::new(original).extension()?.to_str()?;
    let ok = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    ok.then_some(ext)
}

impl fmt::Debug for BlobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobName({})", self.0)
    }
}

impl fmt::Display for BlobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BlobName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
