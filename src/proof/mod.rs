//! The signature-verification seam.
//!
//! Validators never do cryptography themselves: they resolve the signer's key
//! and hand it, together with the token, to a [ProofVerifier].

use std::fmt::Debug;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value as Json;
use tracing::debug;

use crate::core::{
    claim_token::{ClaimToken, ProofFormat},
    jws::{decode_segment, CompactJws},
};

pub mod signer;

/// Public key material resolved for a token's signer.
#[derive(Debug, Clone, PartialEq)]
pub struct SignerKey {
    /// The DID URL of the verification method.
    pub id: String,
    /// The `publicKeyJwk` of the verification method.
    pub jwk: Json,
}

/// Verifies the proof on a token with a resolved key.
///
/// `Ok(false)` means the proof does not hold. `Err` means verification could
/// not be attempted, e.g. an unsupported proof format; it aborts validation.
#[async_trait]
pub trait ProofVerifier: Debug + Send + Sync {
    async fn verify(&self, token: &ClaimToken, key: &SignerKey) -> Result<bool>;
}

/// Verifies compact JWS tokens signed with `ES256` or `ES256K`.
///
/// Linked-data proofs need canonicalization and are rejected; inject a
/// dedicated verifier to accept them.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

#[async_trait]
impl ProofVerifier for SignatureVerifier {
    async fn verify(&self, token: &ClaimToken, key: &SignerKey) -> Result<bool> {
        if token.format() != ProofFormat::Jws {
            bail!("linked data proofs are not supported by this verifier")
        }
        let jws = CompactJws::split(token.raw()).context("token is not a compact JWS")?;

        let Ok(signature) = decode_segment(jws.signature()) else {
            debug!(kid = %key.id, "signature is not valid base64url");
            return Ok(false);
        };
        let jwk = key.jwk.to_string();

        let verified = match token.alg() {
            Some("ES256") => verify_p256(&jwk, jws.signing_input(), &signature),
            Some("ES256K") => verify_k256(&jwk, jws.signing_input(), &signature),
            alg => {
                debug!(?alg, "unsupported signing algorithm");
                false
            }
        };
        Ok(verified)
    }
}

fn verify_p256(jwk: &str, message: &[u8], signature: &[u8]) -> bool {
    use p256::ecdsa::{signature::Verifier, Signature, VerifyingKey};

    let Ok(public_key) = p256::PublicKey::from_jwk_str(jwk) else {
        debug!("key is not a P-256 JWK");
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    VerifyingKey::from(public_key)
        .verify(message, &signature)
        .is_ok()
}

fn verify_k256(jwk: &str, message: &[u8], signature: &[u8]) -> bool {
    use k256::ecdsa::{signature::Verifier, Signature, VerifyingKey};

    let Ok(public_key) = k256::PublicKey::from_jwk_str(jwk) else {
        debug!("key is not a secp256k1 JWK");
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    // ES256K signatures may come with a high S value.
    let signature = signature.normalize_s().unwrap_or(signature);
    VerifyingKey::from(public_key)
        .verify(message, &signature)
        .is_ok()
}
