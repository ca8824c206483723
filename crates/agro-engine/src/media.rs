use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::error::AdvisoryError;

const FALLBACK_MIME: &str = "application/octet-stream";

/// An attachment embedded in the request body rather than referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineMedia {
    /// Base64 of the file bytes.
    pub data: String,
    pub mime_type: String,
}

/// What the event log records about an attachment instead of its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSummary {
    pub mime_type: String,
    pub bytes: usize,
    pub sha256: String,
}

impl InlineMedia {
    pub fn decode(&self) -> Result<Vec<u8>, AdvisoryError> {
        BASE64
            .decode(self.data.as_bytes())
            .map_err(|err| AdvisoryError::Media(format!("invalid base64 payload: {err}")))
    }

    pub fn summary(&self) -> MediaSummary {
        let bytes = self.decode().unwrap_or_default();
        MediaSummary {
            mime_type: self.mime_type.clone(),
            bytes: bytes.len(),
            sha256: hex::encode(Sha256::digest(&bytes)),
        }
    }

    /// The `inlineData` part of a Gemini request.
    pub fn to_part(&self) -> Value {
        json!({
            "inlineData": {
                "mimeType": self.mime_type,
                "data": self.data,
            }
        })
    }
}

/// Reads `path` whole and encodes it for inline transport.
pub fn encode_file(path: &Path) -> Result<InlineMedia, AdvisoryError> {
    let bytes = fs::read(path).map_err(|err| {
        AdvisoryError::Media(format!(
            "No se pudo leer el archivo {}: {err}",
            path.display()
        ))
    })?;
    let mime_type = mime_for_path(path)
        .or_else(|| sniff_mime(&bytes))
        .unwrap_or(FALLBACK_MIME);
    encode_bytes(&bytes, mime_type)
}

/// Encodes through a data URL and takes the payload after the comma. An
/// empty payload is rejected.
pub fn encode_bytes(bytes: &[u8], mime_type: &str) -> Result<InlineMedia, AdvisoryError> {
    let url = data_url(bytes, mime_type);
    let data = payload_from_data_url(&url).ok_or_else(|| {
        AdvisoryError::Media("No se pudo extraer los datos base64 del archivo.".to_string())
    })?;
    Ok(InlineMedia {
        data: data.to_string(),
        mime_type: mime_type.to_string(),
    })
}

fn data_url(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{mime_type};base64,{}", BASE64.encode(bytes))
}

fn payload_from_data_url(url: &str) -> Option<&str> {
    let (header, payload) = url.split_once(',')?;
    if !header.starts_with("data:") || !header.ends_with(";base64") || payload.is_empty() {
        return None;
    }
    Some(payload)
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
}
