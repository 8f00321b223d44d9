use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value as Json};

use crate::core::jws::encode_segment;

#[async_trait]
pub trait TokenSigner: Send + Sync {
    /// The algorithm that will be used to sign.
    fn alg(&self) -> &str;
    /// The public JWK of the signer.
    fn jwk(&self) -> &Json;
    async fn sign(&self, payload: &[u8]) -> Vec<u8>;
}

#[derive(Debug)]
pub struct P256Signer {
    key: p256::ecdsa::SigningKey,
    jwk: Json,
}

impl P256Signer {
    pub fn new(key: p256::ecdsa::SigningKey) -> Result<Self> {
        let pk: p256::PublicKey = key.verifying_key().into();
        let jwk = serde_json::from_str(&pk.to_jwk_string())?;
        Ok(Self { key, jwk })
    }
}

#[async_trait]
impl TokenSigner for P256Signer {
    fn alg(&self) -> &str {
        "ES256"
    }

    fn jwk(&self) -> &Json {
        &self.jwk
    }

    async fn sign(&self, payload: &[u8]) -> Vec<u8> {
        use p256::ecdsa::{signature::Signer, Signature};

        let sig: Signature = self.key.sign(payload);
        sig.to_vec()
    }
}

#[derive(Debug)]
pub struct K256Signer {
    key: k256::ecdsa::SigningKey,
    jwk: Json,
}

impl K256Signer {
    pub fn new(key: k256::ecdsa::SigningKey) -> Result<Self> {
        let pk: k256::PublicKey = key.verifying_key().into();
        let jwk = serde_json::from_str(&pk.to_jwk_string())?;
        Ok(Self { key, jwk })
    }
}

#[async_trait]
impl TokenSigner for K256Signer {
    fn alg(&self) -> &str {
        "ES256K"
    }

    fn jwk(&self) -> &Json {
        &self.jwk
    }

    async fn sign(&self, payload: &[u8]) -> Vec<u8> {
        use k256::ecdsa::{signature::Signer, Signature};

        let sig: Signature = self.key.sign(payload);
        sig.to_vec()
    }
}

/// Sign `payload` as a compact JWS whose header names `kid`.
pub async fn encode_jws(signer: &dyn TokenSigner, kid: &str, payload: &Json) -> Result<String> {
    let header = json!({
        "alg": signer.alg(),
        "typ": "JWT",
        "kid": kid,
    });
    let header = serde_json::to_vec(&header).context("unable to serialize JWS header")?;
    let payload = serde_json::to_vec(payload).context("unable to serialize JWS payload")?;

    let signing_input = format!("{}.{}", encode_segment(header), encode_segment(payload));
    let signature = signer.sign(signing_input.as_bytes()).await;

    Ok(format!("{signing_input}.{}", encode_segment(signature)))
}
