use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Values a relying party expects to find in tokens of one kind.
///
/// Every field is optional; an absent field disables the corresponding check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Expected {
    /// The `aud` claim the token must carry.
    pub audience: Option<String>,

    /// Accepted values for the `iss` claim.
    pub issuers: Option<Vec<String>>,

    /// Credential types a SIOP response must present. Defaults to the types in
    /// the trust configuration.
    pub credential_types: Option<Vec<String>>,

    /// DIDs allowed to sign ID tokens for an `iss` that is not itself a DID,
    /// e.g. an OpenID provider URL. Issuers without an entry are rejected.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub signers: BTreeMap<String, Vec<String>>,
}

impl Expected {
    pub fn audience(audience: impl Into<String>) -> Self {
        Self {
            audience: Some(audience.into()),
            ..Self::default()
        }
    }

    pub fn with_issuers(mut self, issuers: Vec<String>) -> Self {
        self.issuers = Some(issuers);
        self
    }

    /// Allow `dids` to sign ID tokens issued as `issuer`.
    pub fn with_signers(mut self, issuer: impl Into<String>, dids: Vec<String>) -> Self {
        self.signers.insert(issuer.into(), dids);
        self
    }

    /// Whether the key of `signer` may sign tokens claiming `issuer`. A DID
    /// issuer can only sign for itself.
    pub fn may_sign(&self, issuer: &str, signer: &str) -> bool {
        if issuer.starts_with("did:") {
            return issuer == signer;
        }
        self.signers
            .get(issuer)
            .is_some_and(|dids| dids.iter().any(|did| did == signer))
    }

    pub fn with_credential_types(mut self, credential_types: Vec<String>) -> Self {
        self.credential_types = Some(credential_types);
        self
    }
}
