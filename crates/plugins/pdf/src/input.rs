//! Where a PDF comes from: a file path, a `data:` URL or raw base64.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use toolport_core::{Error, Result};

/// Base64 of `%PDF-`.
const PDF_BASE64_PREFIX: &str = "JVBER";

/// Unprefixed strings longer than this made only of base64 characters are
/// treated as inline documents rather than paths.
const MIN_BARE_BASE64_LEN: usize = 260;

#[derive(Debug, PartialEq)]
pub enum PdfSource {
    Path(PathBuf),
    Inline(Vec<u8>),
}

impl PdfSource {
    /// Classify a tool argument. `field` names the parameter in errors.
    pub fn detect(field: &str, input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::validation(field, "must not be empty"));
        }

        if let Some(rest) = input.strip_prefix("data:") {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| Error::validation(field, "malformed data URL"))?;
            if !header.ends_with(";base64") {
                return Err(Error::validation(field, "data URL must be base64 encoded"));
            }
            return decode(field, data).map(Self::Inline);
        }

        if input.starts_with(PDF_BASE64_PREFIX) || looks_like_base64(input) {
            return decode(field, input).map(Self::Inline);
        }

        Ok(Self::Path(PathBuf::from(input)))
    }

    /// Read the document bytes and check the PDF signature.
    pub async fn load(self) -> Result<Vec<u8>> {
        let bytes = match self {
            Self::Inline(bytes) => bytes,
            Self::Path(path) => tokio::fs::read(&path).await.map_err(|e| {
                Error::NotFound(format!("cannot read {}: {}", path.display(), e))
            })?,
        };
        if !bytes.starts_with(b"%PDF") {
            return Err(Error::InvalidData("input is not a PDF document".to_string()));
        }
        Ok(bytes)
    }
}

fn looks_like_base64(input: &str) -> bool {
    input.len() > MIN_BARE_BASE64_LEN
        && input
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=' | b'\n' | b'\r'))
}

fn decode(field: &str, data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(cleaned)
        .map_err(|e| Error::validation(field, format!("invalid base64: {}", e)))
}

/// Encode bytes for returning a document inline.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
