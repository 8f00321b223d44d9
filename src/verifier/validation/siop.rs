use serde_json::Value as Json;
use tracing::debug;

use super::{Claim, Context, Discovered, Failure, Rejection, Validated};
use crate::{
    core::{
        claim_token::{ClaimToken, TokenType},
        presentation_submission::{PathError, PresentationSubmission},
    },
    verifier::queue::QueueItem,
};

/// Validate a SIOP presentation exchange response and queue the token behind
/// every `descriptor_map` entry.
pub(super) async fn validate_presentation_exchange(
    ctx: &Context<'_>,
    item: &QueueItem,
) -> Result<Validated, Failure> {
    let token = &item.token;
    let did = verify_envelope(ctx, token).await?;

    let submission = PresentationSubmission::from_payload(token.decoded())
        .map_err(|e| Rejection::MalformedSubmission(e.to_string()))?
        .unwrap_or_default();

    let mut children = Vec::with_capacity(submission.descriptor_map().len());
    for descriptor in submission.descriptor_map() {
        let descriptor_error = |error| Rejection::Descriptor {
            id: descriptor.id.clone(),
            error,
        };

        let resolved = descriptor.resolve(token.decoded()).map_err(descriptor_error)?;
        let validator = match resolved.token_type() {
            kind @ (TokenType::VerifiablePresentation | TokenType::VerifiableCredential) => kind,
            token_type => {
                return Err(descriptor_error(PathError::UnsupportedToken {
                    path: descriptor.path.clone().unwrap_or_default(),
                    token_type,
                })
                .into())
            }
        };
        debug!(descriptor = %descriptor.id, %validator, "descriptor resolved");

        children.push(Discovered {
            token: resolved,
            validator,
            presenter: Some(did.clone()),
            descriptor_id: Some(descriptor.id.clone()),
        });
    }

    for credential_type in ctx.expected_credential_types() {
        if !submission
            .descriptor_map()
            .iter()
            .any(|descriptor| descriptor.id == credential_type)
        {
            return Err(Rejection::MissingCredential(credential_type.to_owned()).into());
        }
    }

    Ok(Validated {
        claims: envelope_claims(token, did),
        children,
    })
}

/// Validate a SIOP issuance response: its `attestations` carry identity tokens
/// from other providers, presentations keyed by credential type and
/// self-asserted claims.
pub(super) async fn validate_issuance(
    ctx: &Context<'_>,
    item: &QueueItem,
) -> Result<Validated, Failure> {
    let token = &item.token;
    let did = verify_envelope(ctx, token).await?;

    let attestations = token.claim("attestations");
    let section = |name: &str| {
        attestations
            .and_then(|attestations| attestations.get(name))
            .and_then(Json::as_object)
    };

    let mut children = Vec::new();
    for (attestation, expected) in [
        ("idTokens", TokenType::IdToken),
        ("presentations", TokenType::VerifiablePresentation),
    ] {
        for (key, value) in section(attestation).into_iter().flatten() {
            let attested =
                ClaimToken::from_value(value).map_err(|error| Rejection::InvalidAttestation {
                    key: key.clone(),
                    error,
                })?;
            if attested.token_type() != expected {
                return Err(Rejection::WrongKind {
                    actual: attested.token_type(),
                    expected,
                }
                .into());
            }

            children.push(Discovered {
                token: attested,
                validator: expected,
                presenter: Some(did.clone()),
                descriptor_id: (expected == TokenType::VerifiablePresentation)
                    .then(|| key.clone()),
            });
        }
    }

    let presentations = section("presentations");
    for credential_type in ctx.expected_credential_types() {
        if !presentations.is_some_and(|presentations| presentations.contains_key(credential_type)) {
            return Err(Rejection::MissingCredential(credential_type.to_owned()).into());
        }
    }

    let mut claims = envelope_claims(token, did);
    if let Some(self_issued) = attestations.and_then(|attestations| attestations.get("selfIssued")) {
        claims.push(Claim::SelfIssued(self_issued.clone()));
    }

    Ok(Validated { claims, children })
}

/// Checks shared by both SIOP responses. Returns the responder's DID.
async fn verify_envelope(ctx: &Context<'_>, token: &ClaimToken) -> Result<String, Failure> {
    ctx.require_jws(token)?;

    let did = token
        .claim_str("did")
        .filter(|did| !did.is_empty())
        .ok_or(Rejection::MissingDid(ctx.kind))?;

    ctx.verify_jws(token, Some(did)).await?;
    ctx.check_lifetime(token)?;
    ctx.check_audience(token)?;
    ctx.check_issuer(token)?;

    Ok(did.to_owned())
}

fn envelope_claims(token: &ClaimToken, did: String) -> Vec<Claim> {
    let mut claims = vec![Claim::Presenter(did)];
    if let Some(jti) = token.claim_str("jti") {
        claims.push(Claim::SiopJti(jti.to_owned()));
    }
    claims
}
