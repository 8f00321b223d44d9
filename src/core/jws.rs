use base64::prelude::*;
use serde_json::{Map, Value as Json};

/// The three base64url segments of a compact JWS, borrowed from the raw token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactJws<'a> {
    raw: &'a str,
    header: &'a str,
    payload: &'a str,
    signature: &'a str,
}

impl<'a> CompactJws<'a> {
    /// Split a compact JWS into its segments.
    ///
    /// Returns `None` unless the token has exactly three `.`-separated parts
    /// and non-empty header and payload segments.
    pub fn split(raw: &'a str) -> Option<Self> {
        let mut parts = raw.split('.');
        let header = parts.next()?;
        let payload = parts.next()?;
        let signature = parts.next()?;
        if parts.next().is_some() || header.is_empty() || payload.is_empty() {
            return None;
        }
        Some(Self {
            raw,
            header,
            payload,
            signature,
        })
    }

    pub fn header(&self) -> &'a str {
        self.header
    }

    pub fn payload(&self) -> &'a str {
        self.payload
    }

    pub fn signature(&self) -> &'a str {
        self.signature
    }

    /// The bytes covered by the signature: `<header>.<payload>`.
    pub fn signing_input(&self) -> &'a [u8] {
        let end = self.header.len() + 1 + self.payload.len();
        &self.raw.as_bytes()[..end]
    }
}

/// Decode one base64url segment. Trailing padding is tolerated.
pub fn decode_segment(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64_URL_SAFE_NO_PAD.decode(segment.trim_end_matches('='))
}

/// Decode a base64url segment holding a JSON object.
pub fn decode_object(segment: &str) -> Option<Map<String, Json>> {
    let bytes = decode_segment(segment).ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Json::Object(object) => Some(object),
        _ => None,
    }
}

pub fn encode_segment(bytes: impl AsRef<[u8]>) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}
