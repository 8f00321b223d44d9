use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use super::jws::{decode_object, CompactJws};

const PRESENTATION_SUBMISSION: &str = "presentation_submission";
const ATTESTATIONS: &str = "attestations";
const CREDENTIAL_SUBJECT: &str = "credentialSubject";
const VERIFIABLE_CREDENTIAL: &str = "verifiableCredential";
const VERIFIABLE_PRESENTATION_TYPE: &str = "VerifiablePresentation";

/// The kinds of token the validation pipeline knows how to validate.
///
/// Adding a kind here forces every `match` in the queue engine to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenType {
    IdToken,
    SiopIssuance,
    SiopPresentationExchange,
    VerifiablePresentation,
    VerifiableCredential,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::IdToken => "idToken",
            TokenType::SiopIssuance => "siopIssuance",
            TokenType::SiopPresentationExchange => "siopPresentationExchange",
            TokenType::VerifiablePresentation => "verifiablePresentation",
            TokenType::VerifiableCredential => "verifiableCredential",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a token is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProofFormat {
    /// Compact JWS (`header.payload.signature`).
    Jws,
    /// JSON-LD document carrying an embedded `proof` object.
    JsonLd,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassificationError {
    #[error("the token is not a compact JWS or a JSON object")]
    Malformed,

    #[error("the token {0} is not valid base64url JSON")]
    InvalidSegment(&'static str),

    #[error("unrecognized token shape")]
    Unrecognized,
}

/// An opaque signed token together with its decoded payload and kind.
///
/// Decoding never checks signatures; a `ClaimToken` says what a token claims
/// to be, not that it can be trusted.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimToken {
    raw: String,
    header: Option<Map<String, Json>>,
    decoded: Json,
    token_type: TokenType,
    format: ProofFormat,
}

impl ClaimToken {
    /// Decode and classify a raw token: either a compact JWS or the text of a
    /// JSON-LD document.
    pub fn classify(raw: impl Into<String>) -> Result<Self, ClassificationError> {
        let raw = raw.into();

        if raw.trim_start().starts_with('{') {
            let Ok(Json::Object(document)) = serde_json::from_str::<Json>(&raw) else {
                return Err(ClassificationError::Malformed);
            };
            return Self::new(raw, None, document, ProofFormat::JsonLd);
        }

        let jws = CompactJws::split(raw.trim()).ok_or(ClassificationError::Malformed)?;
        let header =
            decode_object(jws.header()).ok_or(ClassificationError::InvalidSegment("header"))?;
        let payload =
            decode_object(jws.payload()).ok_or(ClassificationError::InvalidSegment("payload"))?;
        let raw = raw.trim().to_owned();

        Self::new(raw, Some(header), payload, ProofFormat::Jws)
    }

    /// Classify a value found inside another token's payload. Strings are
    /// treated as raw tokens, objects as JSON-LD documents.
    pub fn from_value(value: &Json) -> Result<Self, ClassificationError> {
        match value {
            Json::String(raw) => Self::classify(raw.as_str()),
            Json::Object(document) => {
                let raw =
                    serde_json::to_string(document).map_err(|_| ClassificationError::Malformed)?;
                Self::new(raw, None, document.clone(), ProofFormat::JsonLd)
            }
            _ => Err(ClassificationError::Malformed),
        }
    }

    fn new(
        raw: String,
        header: Option<Map<String, Json>>,
        payload: Map<String, Json>,
        format: ProofFormat,
    ) -> Result<Self, ClassificationError> {
        let token_type = classify_payload(&payload, format)?;
        Ok(Self {
            raw,
            header,
            decoded: Json::Object(payload),
            token_type,
            format,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The protected header of a JWS token.
    pub fn header(&self) -> Option<&Map<String, Json>> {
        self.header.as_ref()
    }

    pub fn decoded(&self) -> &Json {
        &self.decoded
    }

    pub fn token_type(&self) -> TokenType {
        self.token_type
    }

    pub fn format(&self) -> ProofFormat {
        self.format
    }

    pub fn claim(&self, name: &str) -> Option<&Json> {
        self.decoded.get(name)
    }

    pub fn claim_str(&self, name: &str) -> Option<&str> {
        self.claim(name).and_then(Json::as_str)
    }

    /// The `kid` header parameter of a JWS token.
    pub fn kid(&self) -> Option<&str> {
        self.header.as_ref()?.get("kid")?.as_str()
    }

    /// The `alg` header parameter of a JWS token.
    pub fn alg(&self) -> Option<&str> {
        self.header.as_ref()?.get("alg")?.as_str()
    }
}

fn classify_payload(
    payload: &Map<String, Json>,
    format: ProofFormat,
) -> Result<TokenType, ClassificationError> {
    if payload.contains_key(PRESENTATION_SUBMISSION) {
        return Ok(TokenType::SiopPresentationExchange);
    }

    if payload.contains_key(ATTESTATIONS) {
        return Ok(TokenType::SiopIssuance);
    }

    match format {
        ProofFormat::Jws => {
            if let Some(vc) = payload.get("vc") {
                return match vc.get(CREDENTIAL_SUBJECT) {
                    Some(_) => Ok(TokenType::VerifiableCredential),
                    None => Err(ClassificationError::Unrecognized),
                };
            }

            if payload.contains_key("vp") {
                return Ok(TokenType::VerifiablePresentation);
            }

            let has_issuer = payload.get("iss").is_some_and(Json::is_string);
            let has_audience = match payload.get("aud") {
                Some(Json::String(_)) => true,
                Some(Json::Array(aud)) => !aud.is_empty() && aud.iter().all(Json::is_string),
                _ => false,
            };
            if has_issuer && has_audience {
                return Ok(TokenType::IdToken);
            }
        }
        ProofFormat::JsonLd => {
            if payload.contains_key(CREDENTIAL_SUBJECT) {
                return Ok(TokenType::VerifiableCredential);
            }

            if payload.contains_key(VERIFIABLE_CREDENTIAL)
                || types_of(payload.get("type")).any(|t| t == VERIFIABLE_PRESENTATION_TYPE)
            {
                return Ok(TokenType::VerifiablePresentation);
            }
        }
    }

    Err(ClassificationError::Unrecognized)
}

/// Iterate the entries of a `type` property, which may be a string or an array.
pub(crate) fn types_of(value: Option<&Json>) -> impl Iterator<Item = &str> {
    let (single, many) = match value {
        Some(Json::String(t)) => (Some(t.as_str()), None),
        Some(Json::Array(types)) => (None, Some(types.iter().filter_map(Json::as_str))),
        _ => (None, None),
    };
    single.into_iter().chain(many.into_iter().flatten())
}
