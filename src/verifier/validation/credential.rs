use serde_json::Value as Json;

use super::{linked_data_verification_method, Claim, Context, Failure, Rejection, Validated};
use crate::{
    core::claim_token::{types_of, ProofFormat},
    verifier::queue::QueueItem,
};

/// Validate a verifiable credential, secured either as a JWT (`vc` claim) or
/// with an embedded linked-data proof. A credential found under a descriptor
/// must be of the descriptor's type.
pub(super) async fn validate(ctx: &Context<'_>, item: &QueueItem) -> Result<Validated, Failure> {
    let token = &item.token;
    let presenter = item.presenter.as_deref();

    let (issuer, credential, jwt_subject) = match token.format() {
        ProofFormat::JsonLd => {
            linked_data_verification_method(token)?;
            let issuer =
                document_issuer(token.decoded()).ok_or(Rejection::MissingIssuer(ctx.kind))?;
            ctx.verify_linked_data(token, Some(issuer)).await?;
            ctx.check_document_lifetime(token)?;
            (issuer, token.decoded(), None)
        }
        ProofFormat::Jws => {
            let issuer = token
                .claim_str("iss")
                .ok_or(Rejection::MissingIssuer(ctx.kind))?;
            ctx.verify_jws(token, Some(issuer)).await?;
            ctx.check_lifetime(token)?;
            let vc = token
                .claim("vc")
                .filter(|vc| vc.is_object())
                .ok_or(Rejection::WrongKind {
                    actual: token.token_type(),
                    expected: ctx.kind,
                })?;
            (issuer, vc, token.claim_str("sub"))
        }
    };

    let credential_type = types_of(credential.get("type"))
        .last()
        .ok_or(Rejection::MissingType)?;
    if let Some(id) = item.descriptor_id.as_deref() {
        if id != credential_type {
            return Err(Rejection::CredentialTypeMismatch {
                id: id.to_owned(),
                credential_type: credential_type.to_owned(),
            }
            .into());
        }
    }

    let subject = credential.get("credentialSubject");

    if let Some(presenter) = presenter {
        let bound = jwt_subject.map_or(true, |sub| sub == presenter)
            && subject_ids(subject).all(|id| id == presenter);
        if !bound {
            return Err(Rejection::SubjectMismatch {
                credential_type: credential_type.to_owned(),
                presenter: presenter.to_owned(),
            }
            .into());
        }
    }

    let trust = &ctx.options.trusted_issuers;
    if !trust.is_trusted(credential_type, issuer) {
        return Err(Rejection::UntrustedIssuer {
            credential_type: credential_type.to_owned(),
            trust: trust.to_json(),
        }
        .into());
    }

    Ok(Validated {
        claims: vec![Claim::Credential {
            credential_type: credential_type.to_owned(),
            subject: subject.cloned().unwrap_or(Json::Null),
        }],
        children: Vec::new(),
    })
}

/// The `issuer` of a JSON-LD credential: a DID, or an object with an `id`.
fn document_issuer(document: &Json) -> Option<&str> {
    match document.get("issuer")? {
        Json::String(issuer) => Some(issuer.as_str()),
        issuer => issuer.get("id")?.as_str(),
    }
}

/// The `id` of every subject that carries one.
fn subject_ids(subject: Option<&Json>) -> impl Iterator<Item = &str> {
    let subjects = match subject {
        Some(Json::Array(subjects)) => subjects.as_slice(),
        Some(subject) => std::slice::from_ref(subject),
        None => &[],
    };
    subjects
        .iter()
        .filter_map(|subject| subject.get("id")?.as_str())
}
