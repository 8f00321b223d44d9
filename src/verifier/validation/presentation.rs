use serde_json::Value as Json;

use super::{
    linked_data_verification_method, Claim, Context, Discovered, Failure, Rejection, Validated,
};
use crate::{
    core::claim_token::{ClaimToken, ProofFormat, TokenType},
    verifier::queue::QueueItem,
};

/// Validate a verifiable presentation and queue every credential it wraps,
/// bound to the presentation's holder.
pub(super) async fn validate(ctx: &Context<'_>, item: &QueueItem) -> Result<Validated, Failure> {
    let token = &item.token;
    let known_presenter = item.presenter.as_deref();

    let (presenter, presentation) = match token.format() {
        ProofFormat::Jws => {
            let issuer = token
                .claim_str("iss")
                .ok_or(Rejection::MissingIssuer(ctx.kind))?;
            ctx.verify_jws(token, Some(issuer)).await?;
            if let Some(presenter) = known_presenter.filter(|presenter| *presenter != issuer) {
                return Err(Rejection::Issuer {
                    kind: ctx.kind,
                    expected: presenter.to_owned(),
                }
                .into());
            }
            ctx.check_audience(token)?;
            ctx.check_lifetime(token)?;

            let vp = token
                .claim("vp")
                .filter(|vp| vp.is_object())
                .ok_or(Rejection::WrongKind {
                    actual: token.token_type(),
                    expected: ctx.kind,
                })?;
            (issuer.to_owned(), vp)
        }
        ProofFormat::JsonLd => {
            linked_data_verification_method(token)?;
            let holder = token.claim_str("holder");
            if let (Some(holder), Some(presenter)) = (holder, known_presenter) {
                if holder != presenter {
                    return Err(Rejection::Holder {
                        kind: ctx.kind,
                        expected: presenter.to_owned(),
                    }
                    .into());
                }
            }
            let signer = ctx
                .verify_linked_data(token, holder.or(known_presenter))
                .await?;
            ctx.check_document_lifetime(token)?;
            (signer, token.decoded())
        }
    };

    let children = credentials(presentation.get("verifiableCredential"))
        .map(|credential| {
            let token = ClaimToken::from_value(credential)
                .ok()
                .filter(|token| token.token_type() == TokenType::VerifiableCredential)
                .ok_or(Rejection::NotACredential)?;
            Ok(Discovered {
                token,
                validator: TokenType::VerifiableCredential,
                presenter: Some(presenter.clone()),
                descriptor_id: item.descriptor_id.clone(),
            })
        })
        .collect::<Result<Vec<_>, Rejection>>()?;
    if let (true, Some(id)) = (children.is_empty(), &item.descriptor_id) {
        return Err(Rejection::EmptyPresentation(id.clone()).into());
    }

    let key = item.descriptor_id.clone().unwrap_or_else(|| presenter.clone());
    Ok(Validated {
        claims: vec![
            Claim::Presenter(presenter),
            Claim::Presentation {
                key,
                payload: token.decoded().clone(),
            },
        ],
        children,
    })
}

/// The entries of a `verifiableCredential` property, which may hold a single
/// credential or a list.
fn credentials(value: Option<&Json>) -> impl Iterator<Item = &Json> {
    let credentials = match value {
        Some(Json::Array(credentials)) => credentials.as_slice(),
        Some(credential) => std::slice::from_ref(credential),
        None => &[],
    };
    credentials.iter()
}
