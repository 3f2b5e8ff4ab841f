use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ValidationError;

/// Largest upload the service accepts: 10 MiB.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

const ACCEPTED_EXTENSIONS: &[&str] = &[".mp3"];
const ACCEPTED_MIME_TYPES: &[&str] = &["audio/mpeg", "audio/mp3", "audio/mpeg3"];

/// Where the bytes of an `AudioFile` come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Read lazily at upload time.
    Path(PathBuf),
    Memory(Vec<u8>),
}

/// A candidate upload: the handle the validator and the API client work on.
#[derive(Debug, Clone)]
pub struct AudioFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub source: FileSource,
}

impl AudioFile {
    /// Describe a file on disk. Only metadata is touched here.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let meta = fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            mime_type: mime_for_name(&name).to_string(),
            name,
            size: meta.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    /// Load the file contents for upload.
    pub async fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            FileSource::Path(path) => tokio::fs::read(path).await,
            FileSource::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

fn mime_for_name(name: &str) -> &'static str {
    if has_accepted_extension(name) {
        "audio/mpeg"
    } else {
        "application/octet-stream"
    }
}

fn has_accepted_extension(name: &str) -> bool {
    let lower = name.to_lowercase();
    ACCEPTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Check a candidate upload against the accepted formats and size ceiling.
///
/// Either the extension or the MIME type has to match. A missing file is a
/// reported error, not a panic.
pub fn validate(file: Option<&AudioFile>) -> Result<(), ValidationError> {
    let file = file.ok_or(ValidationError::NoFile)?;

    let type_ok = has_accepted_extension(&file.name)
        || ACCEPTED_MIME_TYPES.contains(&file.mime_type.as_str());
    if !type_ok {
        return Err(ValidationError::UnsupportedType {
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
        });
    }

    if file.size > MAX_FILE_SIZE {
        return Err(ValidationError::TooLarge {
            size: file.size,
            max: MAX_FILE_SIZE,
        });
    }

    Ok(())
}
