#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use p256::ecdsa::SigningKey;
use serde_json::{json, Value as Json};
use siop_validator::{
    core::{
        claim_token::{ClaimToken, ProofFormat, TokenType},
        expected::Expected,
        trust::TrustedIssuers,
    },
    did::{DidDocument, StaticResolver, VerificationMethod},
    proof::{
        signer::{encode_jws, K256Signer, P256Signer, TokenSigner},
        ProofVerifier, SignatureVerifier, SignerKey,
    },
    verifier::{Validator, ValidatorBuilder},
};

pub const RESPONDER: &str = "did:test:responder";
pub const ISSUER: &str = "did:test:issuer";
pub const REQUESTOR: &str = "https://requestor.example.com";
pub const SIOP_JTI: &str = "fa8fdc8f-d95b-4237-9c90-9696112f4e19";
pub const IDENTITY_CARD_PATH: &str = "$.presentation_submission.attestations.presentations.IdentityCard";

/// A DID with one signing key.
pub struct Identity {
    pub did: String,
    signer: Box<dyn TokenSigner>,
}

impl Identity {
    pub fn p256(did: &str) -> Self {
        let signer = P256Signer::new(SigningKey::random(&mut rand::thread_rng())).unwrap();
        Self {
            did: did.to_owned(),
            signer: Box::new(signer),
        }
    }

    pub fn k256(did: &str) -> Self {
        let signer =
            K256Signer::new(k256::ecdsa::SigningKey::random(&mut rand::thread_rng())).unwrap();
        Self {
            did: did.to_owned(),
            signer: Box::new(signer),
        }
    }

    pub fn kid(&self) -> String {
        format!("{}#key-1", self.did)
    }

    pub fn document(&self) -> DidDocument {
        DidDocument {
            id: self.did.clone(),
            verification_method: vec![VerificationMethod {
                id: self.kid(),
                type_: Some("JsonWebKey2020".into()),
                controller: Some(self.did.clone()),
                public_key_jwk: Some(self.signer.jwk().clone()),
            }],
        }
    }

    pub async fn sign(&self, payload: &Json) -> String {
        self.sign_with_kid(&self.kid(), payload).await
    }

    pub async fn sign_with_kid(&self, kid: &str, payload: &Json) -> String {
        encode_jws(self.signer.as_ref(), kid, payload).await.unwrap()
    }
}

/// Accepts linked-data proofs unless their `jws` is `"invalid"`; compact JWS
/// tokens are checked for real.
#[derive(Debug)]
pub struct LinkedDataStub;

#[async_trait]
impl ProofVerifier for LinkedDataStub {
    async fn verify(&self, token: &ClaimToken, key: &SignerKey) -> Result<bool> {
        if token.format() == ProofFormat::Jws {
            return SignatureVerifier.verify(token, key).await;
        }
        let jws = token
            .claim("proof")
            .and_then(|proof| proof.get("jws"))
            .and_then(Json::as_str);
        Ok(jws != Some("invalid"))
    }
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A responder presenting credentials from an issuer to a requestor.
pub struct Fixture {
    pub responder: Identity,
    pub issuer: Identity,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            responder: Identity::p256(RESPONDER),
            issuer: Identity::p256(ISSUER),
        }
    }

    pub fn resolver(&self) -> Arc<StaticResolver> {
        Arc::new(StaticResolver::new([
            self.responder.document(),
            self.issuer.document(),
        ]))
    }

    pub fn trusted_issuers(&self) -> TrustedIssuers {
        TrustedIssuers::new().with("IdentityCard", vec![self.issuer.did.clone()])
    }

    pub fn builder(&self) -> ValidatorBuilder {
        Validator::builder()
            .with_resolver(self.resolver())
            .with_proof_verifier(Arc::new(LinkedDataStub))
            .with_expected(
                TokenType::SiopPresentationExchange,
                Expected::audience(REQUESTOR),
            )
    }

    pub fn validator(&self, trusted_issuers: TrustedIssuers) -> Validator {
        self.builder()
            .with_trusted_issuers(trusted_issuers)
            .build()
            .unwrap()
    }

    pub fn jwt_vc_payload(&self) -> Json {
        json!({
            "iss": self.issuer.did,
            "sub": self.responder.did,
            "jti": "urn:pic:1",
            "nbf": now() - 60,
            "exp": now() + 3600,
            "vc": {
                "@context": ["https://www.w3.org/2018/credentials/v1"],
                "type": ["VerifiableCredential", "IdentityCard"],
                "credentialSubject": {
                    "id": self.responder.did,
                    "givenName": "Jules",
                    "familyName": "Winnfield",
                    "profession": "hitman"
                }
            }
        })
    }

    pub async fn jwt_vc(&self) -> String {
        self.issuer.sign(&self.jwt_vc_payload()).await
    }

    pub fn jwt_vp_payload(&self, credentials: Vec<Json>) -> Json {
        json!({
            "iss": self.responder.did,
            "aud": REQUESTOR,
            "nbf": now() - 60,
            "exp": now() + 3600,
            "vp": {
                "@context": ["https://www.w3.org/2018/credentials/v1"],
                "type": ["VerifiablePresentation"],
                "verifiableCredential": credentials
            }
        })
    }

    pub async fn jwt_vp(&self) -> String {
        let vc = self.jwt_vc().await;
        self.responder
            .sign(&self.jwt_vp_payload(vec![Json::String(vc)]))
            .await
    }

    pub fn json_ld_vc(&self) -> Json {
        json!({
            "@context": [
                "https://www.w3.org/2018/credentials/v1",
                "https://example.com/contracts/IdentityCard/schema"
            ],
            "id": "urn:pic:1",
            "type": ["VerifiableCredential", "IdentityCard"],
            "issuer": self.issuer.did,
            "issuanceDate": "2020-06-01T12:00:00Z",
            "credentialSubject": {
                "id": self.responder.did,
                "givenName": "Jules",
                "familyName": "Winnfield",
                "profession": "hitman"
            },
            "proof": {
                "type": "JsonWebSignature2020",
                "created": "2020-06-01T12:00:00Z",
                "proofPurpose": "assertionMethod",
                "verificationMethod": self.issuer.kid(),
                "jws": "eyJhbGciOiJFUzI1NiJ9..c2lnbmF0dXJl"
            }
        })
    }

    /// A SIOP presentation exchange response presenting `presentation` as
    /// the `IdentityCard` input descriptor.
    pub fn siop_payload(&self, presentation: Json) -> Json {
        json!({
            "iss": "https://self-issued.me",
            "aud": REQUESTOR,
            "did": self.responder.did,
            "jti": SIOP_JTI,
            "nonce": "n-0S6_WzA2Mj",
            "iat": now(),
            "exp": now() + 300,
            "presentation_submission": {
                "descriptor_map": [
                    {
                        "id": "IdentityCard",
                        "format": "jwt",
                        "encoding": "base64Url",
                        "path": IDENTITY_CARD_PATH
                    }
                ],
                "attestations": {
                    "presentations": {
                        "IdentityCard": presentation
                    }
                }
            }
        })
    }

    pub async fn siop(&self, payload: &Json) -> String {
        self.responder.sign(payload).await
    }
}
