//! DID resolution: the trait the validators depend on, the document model
//! they read keys from, and two resolvers.

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

pub mod universal;

pub use self::universal::ManagedHttpResolver;

/// Resolves a DID to its document.
#[async_trait]
pub trait DidResolver: Debug + Send + Sync {
    async fn resolve(&self, did: &str) -> Result<DidResolution, ResolutionError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DidResolution {
    pub document: DidDocument,
    pub metadata: Json,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolutionError {
    /// The resolver answered, but not with a document.
    #[error("Could not resolve {0}")]
    NotFound(String),

    /// The resolver could not be reached or answered garbage.
    #[error("unable to resolve {did}: {cause:#}")]
    Transport { did: String, cause: Arc<anyhow::Error> },
}

/// The parts of a DID document used to find signing keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    pub id: String,
    #[serde(default, alias = "publicKey", skip_serializing_if = "Vec::is_empty")]
    pub verification_method: Vec<VerificationMethod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<Json>,
}

impl DidDocument {
    /// Find the verification method a DID URL points at. Relative ids
    /// (`#key-1`) in the document match on the fragment.
    pub fn verification_method(&self, did_url: &str) -> Option<&VerificationMethod> {
        let fragment = split_did_url(did_url).1;
        self.verification_method.iter().find(|vm| {
            vm.id == did_url
                || matches!(
                    (vm.id.strip_prefix('#'), fragment),
                    (Some(id), Some(fragment)) if id == fragment
                )
        })
    }
}

/// Split a DID URL (`did:example:123#key-1`) into the DID and its fragment.
pub fn split_did_url(did_url: &str) -> (&str, Option<&str>) {
    match did_url.split_once('#') {
        Some((did, fragment)) => (did, Some(fragment)),
        None => (did_url, None),
    }
}

/// A local in-memory resolver.
///
/// Serves a fixed set of documents; useful for tests and for deployments that
/// pin the DIDs they talk to.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    documents: Arc<HashMap<String, DidDocument>>,
}

impl StaticResolver {
    pub fn new(documents: impl IntoIterator<Item = DidDocument>) -> Self {
        Self {
            documents: Arc::new(
                documents
                    .into_iter()
                    .map(|document| (document.id.clone(), document))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl DidResolver for StaticResolver {
    async fn resolve(&self, did: &str) -> Result<DidResolution, ResolutionError> {
        let document = self
            .documents
            .get(did)
            .cloned()
            .ok_or_else(|| ResolutionError::NotFound(did.to_owned()))?;

        Ok(DidResolution {
            document,
            metadata: Json::Null,
        })
    }
}
