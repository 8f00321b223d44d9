use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use serde_json_path::JsonPath;

use super::claim_token::{ClaimToken, ClassificationError, TokenType};

/// A DescriptorMapId is the id of the input descriptor a submission entry answers.
pub type DescriptorMapId = String;

/// The `presentation_submission` claim of a SIOP presentation exchange response.
///
/// Only the `descriptor_map` takes part in validation; `id` and
/// `definition_id` are carried for callers that correlate with their request.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationSubmission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_id: Option<String>,
    #[serde(default)]
    pub descriptor_map: Vec<DescriptorMap>,
}

impl PresentationSubmission {
    pub const KEY: &'static str = "presentation_submission";

    /// Read the submission out of a decoded response payload.
    ///
    /// Returns `Ok(None)` when the payload has no submission at all.
    pub fn from_payload(payload: &Json) -> Result<Option<Self>, serde_json::Error> {
        payload
            .get(Self::KEY)
            .cloned()
            .map(serde_json::from_value)
            .transpose()
    }

    /// Return the descriptor map of the presentation submission.
    pub fn descriptor_map(&self) -> &[DescriptorMap] {
        &self.descriptor_map
    }
}

/// One entry of a `descriptor_map`: where the token answering input
/// descriptor `id` lives inside the response.
///
/// `path` is kept optional so that a missing path is reported against the
/// descriptor instead of failing the whole submission.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DescriptorMap {
    pub id: DescriptorMapId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl DescriptorMap {
    pub fn new(id: impl Into<DescriptorMapId>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            format: None,
            encoding: None,
            path: Some(path.into()),
        }
    }

    /// Evaluate `path` against the decoded `response` and classify the single
    /// token it selects.
    pub fn resolve(&self, response: &Json) -> Result<ClaimToken, PathError> {
        let path = self.path.as_deref().ok_or(PathError::MissingPath)?;
        let json_path =
            JsonPath::parse(path).map_err(|_| PathError::InvalidPath(path.to_owned()))?;

        let nodes = json_path.query(response);
        let value = match (nodes.len(), nodes.first()) {
            (1, Some(value)) if !value.is_null() => value,
            (0 | 1, _) => return Err(PathError::NoToken(path.to_owned())),
            _ => return Err(PathError::Ambiguous(path.to_owned())),
        };

        ClaimToken::from_value(value).map_err(|source| PathError::Unclassified {
            path: path.to_owned(),
            source,
        })
    }
}

/// Why a descriptor did not lead to a token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("No path property found.")]
    MissingPath,

    #[error("This path '{0}' is not a valid JSONPath expression.")]
    InvalidPath(String),

    #[error("This path '{0}' did not return a token.")]
    NoToken(String),

    #[error("This path '{0}' returned more than one token.")]
    Ambiguous(String),

    #[error("The token at path '{path}' could not be classified: {source}.")]
    Unclassified {
        path: String,
        source: ClassificationError,
    },

    #[error(
        "The token at path '{path}' is a {token_type}, expected a verifiable presentation or credential."
    )]
    UnsupportedToken { path: String, token_type: TokenType },
}
