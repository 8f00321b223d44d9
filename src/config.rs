use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

use crate::core::{claim_token::TokenType, expected::Expected, trust::TrustedIssuers};

/// Declarative configuration for a [Validator](crate::verifier::Validator).
///
/// ```json
/// {
///   "resolver": "https://resolver.example.com",
///   "trustedIssuers": { "IdentityCard": ["did:ion:issuer"] },
///   "expected": { "siopPresentationExchange": { "audience": "https://rp.example.com" } }
/// }
/// ```
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Base URL of the universal resolver.
    pub resolver: BaseUrl,
    #[serde(default = "default_ttl")]
    pub did_cache_ttl_secs: u64,
    #[serde(default = "default_entry_point")]
    pub entry_point: TokenType,
    #[serde(default)]
    pub trusted_issuers: TrustedIssuers,
    /// What tokens of each kind must contain. SIOP responses and ID tokens
    /// are rejected at build time without an `audience`.
    #[serde(default)]
    pub expected: BTreeMap<TokenType, Expected>,
    #[serde(default = "default_clock_skew")]
    pub clock_skew_secs: u64,
}

fn default_ttl() -> u64 {
    300
}

fn default_entry_point() -> TokenType {
    TokenType::SiopPresentationExchange
}

fn default_clock_skew() -> u64 {
    300
}

impl ValidatorConfig {
    /// Parse a JSON configuration document, naming the offending field on error.
    pub fn from_json(json: &str) -> Result<Self> {
        let deserializer = &mut serde_json::Deserializer::from_str(json);
        serde_path_to_error::deserialize(deserializer).map_err(|e| {
            let path = e.path().to_string();
            anyhow::Error::new(e.into_inner())
                .context(format!("invalid validator configuration at '{path}'"))
        })
    }

    /// Read a JSON configuration file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read '{}'", path.display()))?;
        Self::from_json(&json)
    }
}

/// A url that is always a base (can be safely join()'ed with further path elements without
/// mangling).
#[derive(Deserialize, Debug, Clone, Hash, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct BaseUrl(Url);

impl std::ops::Deref for BaseUrl {
    type Target = Url;

    fn deref(&self) -> &Url {
        &self.0
    }
}

impl TryFrom<String> for BaseUrl {
    type Error = url::ParseError;

    fn try_from(mut url: String) -> Result<Self, Self::Error> {
        // Make URL a base.
        if !url.ends_with('/') {
            url += "/"
        }
        url.parse().map(Self)
    }
}

impl std::str::FromStr for BaseUrl {
    type Err = url::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}
