//! Transport-neutral file attachments

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MIME type used when an upload does not declare one
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Name given to uploads that carry bytes but no filename
const UNNAMED_ATTACHMENT: &str = "attachment";

#[derive(Debug, Error, PartialEq)]
pub enum AttachmentError {
    /// The upload has neither a filename nor any bytes
    #[error("Upload carries no filename and no content")]
    EmptyPayload,

    #[error("Attachment payload is not valid base64: {0}")]
    Decode(String),
}

/// An uploaded file, normalized for forwarding to an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    /// Base64 (standard alphabet, padded) encoding of the file bytes
    pub data: String,
}

impl Attachment {
    /// Normalize a raw upload.
    ///
    /// Fails only when both the filename and the payload are empty. A missing
    /// or blank content type falls back to [`DEFAULT_MIME_TYPE`].
    pub fn from_upload(
        bytes: &[u8],
        filename: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<Self, AttachmentError> {
        let filename = filename.map(str::trim).filter(|n| !n.is_empty());
        if bytes.is_empty() && filename.is_none() {
            return Err(AttachmentError::EmptyPayload);
        }

        let mime_type = content_type
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE);

        Ok(Self {
            name: filename.unwrap_or(UNNAMED_ATTACHMENT).to_string(),
            mime_type: mime_type.to_ascii_lowercase(),
            data: STANDARD.encode(bytes),
        })
    }

    /// Recover the original bytes
    pub fn decode(&self) -> Result<Vec<u8>, AttachmentError> {
        STANDARD
            .decode(&self.data)
            .map_err(|e| AttachmentError::Decode(e.to_string()))
    }

    /// Size of the decoded payload in bytes
    pub fn size(&self) -> usize {
        let padding = self.data.bytes().rev().take_while(|b| *b == b'=').count();
        ((self.data.len() / 4) * 3).saturating_sub(padding.min(2))
    }

    /// Coarse category used for capability matching.
    ///
    /// `image/png` gives `image`; `application/pdf` gives `pdf` since the
    /// top-level `application` type says nothing useful. Undeclared types are
    /// guessed from the file extension.
    pub fn category(&self) -> String {
        let mime = if self.mime_type == DEFAULT_MIME_TYPE {
            mime_guess::from_path(&self.name)
                .first_raw()
                .unwrap_or(DEFAULT_MIME_TYPE)
                .to_string()
        } else {
            self.mime_type.clone()
        };

        let (top, sub) = mime.split_once('/').unwrap_or((mime.as_str(), ""));
        let sub = sub.split(';').next().unwrap_or("").trim();
        match top {
            "application" if !sub.is_empty() => sub.to_string(),
            _ => top.to_string(),
        }
    }
}
