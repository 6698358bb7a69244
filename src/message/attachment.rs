use std::{
    io,
    path::{Path, PathBuf},
};

use crate::error::BuildError;

/// A file embedded in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Where the content was read from.
    pub path: PathBuf,
    /// The filename to use in the MIME header.
    pub filename: String,
    /// The MIME content type (e.g., "application/pdf").
    pub content_type: String,
    /// The attachment data.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Reads the file at `path`, naming the part after its last path
    /// component and guessing the content type from its extension.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::AttachmentUnavailable`] if the path has no file
    /// name or cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let unavailable = |source| BuildError::AttachmentUnavailable {
            path: path.to_path_buf(),
            source,
        };

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                unavailable(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "path does not name a file",
                ))
            })?;

        let data = std::fs::read(path).map_err(unavailable)?;

        Ok(Self {
            path: path.to_path_buf(),
            filename,
            content_type: mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
            data,
        })
    }
}
