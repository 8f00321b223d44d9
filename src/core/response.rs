use std::collections::BTreeMap;

use http::StatusCode;
use serde::Serialize;
use serde_json::Value as Json;

/// Claims collected from every token that passed validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// The DID of the party that presented the tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,

    /// The `jti` of the outer SIOP response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub siop_jti: Option<String>,

    /// Verified ID token payloads by issuer.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub id_tokens: BTreeMap<String, Json>,

    /// Verified presentation payloads by descriptor id or issuer.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub verifiable_presentations: BTreeMap<String, Json>,

    /// Verified `credentialSubject` claims by credential type.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub verifiable_credentials: BTreeMap<String, Json>,

    /// Self-asserted claims of a SIOP issuance response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_issued: Option<Json>,
}

/// The verdict for a queue item, or for a whole `validate` call.
///
/// A successful response never carries an error; a failed one always carries
/// a non-empty `detailed_error` and a failure status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    result: bool,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    detailed_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation_result: Option<ValidationResult>,
}

impl ValidationResponse {
    pub fn success(validation_result: ValidationResult) -> Self {
        Self {
            result: true,
            status: StatusCode::OK.as_u16(),
            detailed_error: None,
            validation_result: Some(validation_result),
        }
    }

    pub fn failure(status: StatusCode, detailed_error: impl Into<String>) -> Self {
        let mut detailed_error = detailed_error.into();
        if detailed_error.is_empty() {
            detailed_error = "validation failed".to_owned();
        }
        let status = if status.is_success() {
            StatusCode::FORBIDDEN
        } else {
            status
        };

        Self {
            result: false,
            status: status.as_u16(),
            detailed_error: Some(detailed_error),
            validation_result: None,
        }
    }

    pub fn result(&self) -> bool {
        self.result
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn detailed_error(&self) -> Option<&str> {
        self.detailed_error.as_deref()
    }

    pub fn validation_result(&self) -> Option<&ValidationResult> {
        self.validation_result.as_ref()
    }

    pub fn into_validation_result(self) -> Option<ValidationResult> {
        self.validation_result
    }
}
