use super::{Claim, Context, Failure, Rejection, Validated};
use crate::verifier::queue::QueueItem;

/// Validate an OpenID identity token: signature, signer bound to the issuer,
/// audience, lifetime and accepted issuers.
pub(super) async fn validate(ctx: &Context<'_>, item: &QueueItem) -> Result<Validated, Failure> {
    let token = &item.token;
    ctx.require_jws(token)?;

    let signer = ctx.verify_jws(token, None).await?;
    let issuer = token
        .claim_str("iss")
        .ok_or(Rejection::MissingIssuer(ctx.kind))?;
    if !ctx.expected().may_sign(issuer, &signer) {
        return Err(Rejection::ForeignKey {
            kind: ctx.kind,
            kid: token.kid().unwrap_or_default().to_owned(),
            did: issuer.to_owned(),
        }
        .into());
    }

    ctx.check_audience(token)?;
    ctx.check_lifetime(token)?;
    ctx.check_issuer(token)?;

    Ok(Validated {
        claims: vec![Claim::IdToken {
            issuer: issuer.to_owned(),
            payload: token.decoded().clone(),
        }],
        children: Vec::new(),
    })
}
