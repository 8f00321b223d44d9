//! Per-kind token validators and the checks they share.
//!
//! A validator never touches the queue. It either rejects the item, or
//! returns the claims it verified together with the nested tokens it
//! discovered, which the queue then schedules as children.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use http::StatusCode;
use serde_json::Value as Json;
use tracing::debug;

use super::{queue::QueueItem, Options};
use crate::{
    core::{
        claim_token::{ClaimToken, ClassificationError, ProofFormat, TokenType},
        expected::Expected,
        presentation_submission::PathError,
    },
    did::{split_did_url, ResolutionError},
    proof::SignerKey,
};

mod credential;
mod id_token;
mod presentation;
mod siop;

static NO_EXPECTATIONS: Expected = Expected {
    audience: None,
    issuers: None,
    credential_types: None,
    signers: BTreeMap::new(),
};

/// Why a token was rejected. The `Display` output is the `detailedError` of
/// the resulting [ValidationResponse](crate::core::response::ValidationResponse).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error(transparent)]
    Unclassified(ClassificationError),

    #[error("The presented {0} is has an invalid signature")]
    InvalidSignature(TokenType),

    #[error("The presented {0} does not reference a signing key")]
    MissingKid(TokenType),

    #[error("Could not resolve {0}")]
    UnresolvableDid(String),

    #[error("The key '{kid}' is not found in the DID document of '{did}'")]
    UnknownKey { kid: String, did: String },

    #[error("The presented {kind} is signed with '{kid}' which does not belong to '{did}'")]
    ForeignKey {
        kind: TokenType,
        kid: String,
        did: String,
    },

    #[error("The presented {0} is expired")]
    Expired(TokenType),

    #[error("The presented {0} is not yet valid")]
    NotYetValid(TokenType),

    #[error("The presented {kind} has an invalid {claim} property")]
    InvalidTimeClaim { kind: TokenType, claim: &'static str },

    #[error("Wrong or missing aud property in {kind}. Expected '{expected}'")]
    Audience { kind: TokenType, expected: String },

    #[error("Wrong or missing iss property in {kind}. Expected '{expected}'")]
    Issuer { kind: TokenType, expected: String },

    #[error("Wrong or missing iss property in {0}")]
    MissingIssuer(TokenType),

    #[error("Wrong or missing holder property in {kind}. Expected '{expected}'")]
    Holder { kind: TokenType, expected: String },

    #[error("Wrong or missing did property in {0}")]
    MissingDid(TokenType),

    #[error("The presented {actual} cannot be validated as {expected}")]
    WrongKind {
        actual: TokenType,
        expected: TokenType,
    },

    #[error("The verifiable presentation contains a token that is not a verifiable credential")]
    NotACredential,

    #[error("The verifiable credential does not declare a type")]
    MissingType,

    #[error("The verifiable credential with type '{credential_type}' is presented as '{id}'")]
    CredentialTypeMismatch { id: String, credential_type: String },

    #[error("The verifiable presentation presented as '{0}' does not contain a verifiable credential")]
    EmptyPresentation(String),

    #[error("Verifiable credential '{0}' is missing from the input request")]
    MissingCredential(String),

    #[error("The proof is not available in the json ld payload")]
    MissingProof,

    #[error("The proof does not contain the verificationMethod in the json ld payload")]
    MissingVerificationMethod,

    #[error("The verifiable credential with type '{credential_type}', the id in the credentialSubject property does not match the presenter DID: {presenter}")]
    SubjectMismatch {
        credential_type: String,
        presenter: String,
    },

    #[error("The verifiable credential with type '{credential_type}' is not from a trusted issuer '{trust}'")]
    UntrustedIssuer {
        credential_type: String,
        trust: String,
    },

    #[error("The SIOP presentation exchange response has descriptor_map with id '{id}'. {error}")]
    Descriptor { id: String, error: PathError },

    #[error("The presentation_submission of the SIOP presentation exchange response is malformed: {0}")]
    MalformedSubmission(String),

    #[error("The attestation '{key}' of the SIOP issuance response could not be classified: {error}")]
    InvalidAttestation {
        key: String,
        error: ClassificationError,
    },
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::Unclassified(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::FORBIDDEN,
        }
    }
}

/// How validating one item can end badly.
#[derive(Debug)]
pub(crate) enum Failure {
    /// The token is not acceptable; reported as a structured response.
    Rejected(Rejection),
    /// Validation could not be carried out at all.
    Unexpected(anyhow::Error),
}

impl From<Rejection> for Failure {
    fn from(rejection: Rejection) -> Self {
        Failure::Rejected(rejection)
    }
}

impl From<anyhow::Error> for Failure {
    fn from(error: anyhow::Error) -> Self {
        Failure::Unexpected(error)
    }
}

impl From<ResolutionError> for Failure {
    fn from(error: ResolutionError) -> Self {
        match error {
            ResolutionError::NotFound(did) => Rejection::UnresolvableDid(did).into(),
            error @ ResolutionError::Transport { .. } => Failure::Unexpected(error.into()),
        }
    }
}

/// A token found inside a validated one, to be validated next.
#[derive(Debug, Clone)]
pub(crate) struct Discovered {
    pub token: ClaimToken,
    pub validator: TokenType,
    pub presenter: Option<String>,
    pub descriptor_id: Option<String>,
}

/// A verified fact contributed to the [ValidationResult](crate::core::response::ValidationResult).
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Claim {
    Presenter(String),
    SiopJti(String),
    IdToken { issuer: String, payload: Json },
    Presentation { key: String, payload: Json },
    Credential { credential_type: String, subject: Json },
    SelfIssued(Json),
}

#[derive(Debug, Default)]
pub(crate) struct Validated {
    pub claims: Vec<Claim>,
    pub children: Vec<Discovered>,
}

/// Run the validator matching the item's validator type.
pub(crate) async fn validate(item: &QueueItem, options: &Options) -> Result<Validated, Failure> {
    let ctx = Context::new(options, item.validator);
    match item.validator {
        TokenType::IdToken => id_token::validate(&ctx, item).await,
        TokenType::VerifiableCredential => credential::validate(&ctx, item).await,
        TokenType::VerifiablePresentation => presentation::validate(&ctx, item).await,
        TokenType::SiopPresentationExchange => siop::validate_presentation_exchange(&ctx, item).await,
        TokenType::SiopIssuance => siop::validate_issuance(&ctx, item).await,
    }
}

/// Everything one validator run can see: the shared options, the kind it
/// validates as, and the instant it validates at.
pub(crate) struct Context<'a> {
    options: &'a Options,
    kind: TokenType,
    now: DateTime<Utc>,
}

impl<'a> Context<'a> {
    fn new(options: &'a Options, kind: TokenType) -> Self {
        Self {
            options,
            kind,
            now: Utc::now(),
        }
    }

    fn expected(&self) -> &Expected {
        self.options.expected.get(&self.kind).unwrap_or(&NO_EXPECTATIONS)
    }

    fn require_jws(&self, token: &ClaimToken) -> Result<(), Rejection> {
        if token.format() != ProofFormat::Jws {
            return Err(Rejection::WrongKind {
                actual: token.token_type(),
                expected: self.kind,
            });
        }
        Ok(())
    }

    /// Find the public key `kid` points at.
    async fn signer_key(&self, kid: &str) -> Result<SignerKey, Failure> {
        let did = split_did_url(kid).0;
        let resolution = self.options.resolver.resolve(did).await?;

        let jwk = resolution
            .document
            .verification_method(kid)
            .and_then(|method| method.public_key_jwk.clone())
            .ok_or_else(|| Rejection::UnknownKey {
                kid: kid.to_owned(),
                did: did.to_owned(),
            })?;

        Ok(SignerKey {
            id: kid.to_owned(),
            jwk,
        })
    }

    /// Check that the key `kid` belongs to `claimed`, when the token claims an
    /// identity.
    fn check_key_owner(&self, kid: &str, claimed: Option<&str>) -> Result<(), Rejection> {
        match claimed {
            Some(did) if split_did_url(kid).0 != did => Err(Rejection::ForeignKey {
                kind: self.kind,
                kid: kid.to_owned(),
                did: did.to_owned(),
            }),
            _ => Ok(()),
        }
    }

    /// Resolve the `kid` of a compact JWS and verify its signature. Returns the
    /// signer's DID.
    async fn verify_jws(&self, token: &ClaimToken, claimed: Option<&str>) -> Result<String, Failure> {
        let kid = token.kid().ok_or(Rejection::MissingKid(self.kind))?;
        self.check_key_owner(kid, claimed)?;
        let key = self.signer_key(kid).await?;
        self.verify_proof(token, &key).await?;
        Ok(split_did_url(kid).0.to_owned())
    }

    /// Check the structure of an embedded linked-data proof, resolve its
    /// verification method and verify it. Returns the signer's DID.
    async fn verify_linked_data(
        &self,
        token: &ClaimToken,
        claimed: Option<&str>,
    ) -> Result<String, Failure> {
        let verification_method = linked_data_verification_method(token)?;
        self.check_key_owner(verification_method, claimed)?;
        let key = self.signer_key(verification_method).await?;
        self.verify_proof(token, &key).await?;
        Ok(split_did_url(verification_method).0.to_owned())
    }

    async fn verify_proof(&self, token: &ClaimToken, key: &SignerKey) -> Result<(), Failure> {
        if !self.options.proof_verifier.verify(token, key).await? {
            debug!(kid = %key.id, "proof does not verify");
            return Err(Rejection::InvalidSignature(self.kind).into());
        }
        Ok(())
    }

    /// Check `exp` and `nbf` (NumericDate claims) with the configured skew.
    fn check_lifetime(&self, token: &ClaimToken) -> Result<(), Rejection> {
        if let Some(exp) = self.numeric_date(token, "exp")? {
            self.check_not_after(exp)?;
        }
        if let Some(nbf) = self.numeric_date(token, "nbf")? {
            self.check_not_before(nbf)?;
        }
        Ok(())
    }

    /// Check `expirationDate` and `issuanceDate` (RFC 3339) of a JSON-LD
    /// document with the configured skew.
    fn check_document_lifetime(&self, token: &ClaimToken) -> Result<(), Rejection> {
        if let Some(expiration) = self.date_time(token, "expirationDate")? {
            self.check_not_after(expiration)?;
        }
        if let Some(issuance) = self.date_time(token, "issuanceDate")? {
            self.check_not_before(issuance)?;
        }
        Ok(())
    }

    fn check_not_after(&self, expiry: i64) -> Result<(), Rejection> {
        if self.now.timestamp().saturating_sub(self.skew()) >= expiry {
            return Err(Rejection::Expired(self.kind));
        }
        Ok(())
    }

    fn check_not_before(&self, start: i64) -> Result<(), Rejection> {
        if start.saturating_sub(self.skew()) > self.now.timestamp() {
            return Err(Rejection::NotYetValid(self.kind));
        }
        Ok(())
    }

    fn skew(&self) -> i64 {
        i64::try_from(self.options.clock_skew.as_secs()).unwrap_or(i64::MAX)
    }

    fn numeric_date(&self, token: &ClaimToken, claim: &'static str) -> Result<Option<i64>, Rejection> {
        match token.claim(claim) {
            None | Some(Json::Null) => Ok(None),
            Some(value) => value
                .as_i64()
                .or_else(|| value.as_f64().map(|seconds| seconds as i64))
                .map(Some)
                .ok_or(Rejection::InvalidTimeClaim {
                    kind: self.kind,
                    claim,
                }),
        }
    }

    fn date_time(&self, token: &ClaimToken, claim: &'static str) -> Result<Option<i64>, Rejection> {
        match token.claim(claim) {
            None | Some(Json::Null) => Ok(None),
            Some(value) => value
                .as_str()
                .and_then(|date| DateTime::parse_from_rfc3339(date).ok())
                .map(|date| Some(date.timestamp()))
                .ok_or(Rejection::InvalidTimeClaim {
                    kind: self.kind,
                    claim,
                }),
        }
    }

    /// Check `aud` against the expected audience, if one is configured.
    fn check_audience(&self, token: &ClaimToken) -> Result<(), Rejection> {
        let Some(expected) = self.expected().audience.as_deref() else {
            return Ok(());
        };

        let matches = match token.claim("aud") {
            Some(Json::String(aud)) => aud == expected,
            Some(Json::Array(audiences)) => audiences.iter().any(|aud| aud.as_str() == Some(expected)),
            _ => false,
        };
        if !matches {
            return Err(Rejection::Audience {
                kind: self.kind,
                expected: expected.to_owned(),
            });
        }
        Ok(())
    }

    /// Check `iss` against the accepted issuers, if any are configured.
    fn check_issuer(&self, token: &ClaimToken) -> Result<(), Rejection> {
        let Some(issuers) = &self.expected().issuers else {
            return Ok(());
        };

        let accepted = token
            .claim_str("iss")
            .is_some_and(|iss| issuers.iter().any(|issuer| issuer == iss));
        if !accepted {
            return Err(Rejection::Issuer {
                kind: self.kind,
                expected: issuers.join(", "),
            });
        }
        Ok(())
    }

    /// Credential types a SIOP response must carry.
    fn expected_credential_types(&self) -> Vec<&str> {
        match &self.expected().credential_types {
            Some(types) => types.iter().map(String::as_str).collect(),
            None => self.options.trusted_issuers.credential_types().collect(),
        }
    }
}

/// The `verificationMethod` of an embedded proof. A proof set uses its first
/// proof.
fn linked_data_verification_method(token: &ClaimToken) -> Result<&str, Rejection> {
    let proof = match token.claim("proof") {
        Some(Json::Array(proofs)) => proofs.first(),
        proof => proof,
    };
    let proof = proof.filter(|p| p.is_object()).ok_or(Rejection::MissingProof)?;

    proof
        .get("verificationMethod")
        .and_then(Json::as_str)
        .ok_or(Rejection::MissingVerificationMethod)
}
