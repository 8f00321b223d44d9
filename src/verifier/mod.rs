use std::{collections::BTreeMap, sync::Arc, time::Duration};

use anyhow::{bail, Result};
use tracing::{info_span, instrument, warn, Instrument};
use uuid::Uuid;

use crate::{
    config::ValidatorConfig,
    core::{
        claim_token::{ClaimToken, TokenType},
        expected::Expected,
        response::ValidationResponse,
        trust::TrustedIssuers,
        util::ReqwestClient,
    },
    did::{DidResolver, ManagedHttpResolver},
    proof::{ProofVerifier, SignatureVerifier},
};

use queue::ValidationQueue;

pub use validation::Rejection;

mod queue;
mod validation;

/// Tolerance applied to every time-based check by default.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Validates SIOP responses, presentations, credentials and ID tokens,
/// following every token nested in the one it is given.
///
/// A `Validator` holds only immutable configuration; each call to
/// [Validator::validate] works on its own queue, so calls can run
/// concurrently from clones of the same validator.
#[derive(Debug, Clone)]
pub struct Validator {
    entry_point: TokenType,
    options: Arc<Options>,
}

/// Configuration shared by every validator run.
#[derive(Debug)]
pub(crate) struct Options {
    resolver: Arc<dyn DidResolver>,
    proof_verifier: Arc<dyn ProofVerifier>,
    trusted_issuers: TrustedIssuers,
    expected: BTreeMap<TokenType, Expected>,
    clock_skew: Duration,
}

impl Validator {
    /// Build a new validator.
    pub fn builder() -> ValidatorBuilder {
        ValidatorBuilder::default()
    }

    /// The token type the seed token is validated as.
    pub fn entry_point(&self) -> TokenType {
        self.entry_point
    }

    /// Validate `raw` as the configured entry point and every token nested in
    /// it.
    ///
    /// Rejections come back as a failed [ValidationResponse]. `Err` means the
    /// token could not be validated at all, e.g. because the DID resolver was
    /// unreachable, and must be treated as a failure too.
    #[instrument(skip_all, fields(run = %Uuid::new_v4(), entry_point = %self.entry_point))]
    pub async fn validate(&self, raw: &str) -> Result<ValidationResponse> {
        let token = match ClaimToken::classify(raw) {
            Ok(token) => token,
            Err(error) => {
                let rejection = Rejection::Unclassified(error);
                warn!(error = %rejection, "seed token rejected");
                return Ok(ValidationResponse::failure(
                    rejection.status(),
                    rejection.to_string(),
                ));
            }
        };

        let span = info_span!("queue", seed = %token.token_type());
        ValidationQueue::seed(token, self.entry_point)
            .run(&self.options)
            .instrument(span)
            .await
    }
}

/// Builder struct for [Validator].
#[derive(Debug, Clone)]
pub struct ValidatorBuilder {
    resolver: Option<Arc<dyn DidResolver>>,
    proof_verifier: Arc<dyn ProofVerifier>,
    trusted_issuers: TrustedIssuers,
    entry_point: TokenType,
    expected: BTreeMap<TokenType, Expected>,
    clock_skew: Duration,
}

impl Default for ValidatorBuilder {
    fn default() -> Self {
        Self {
            resolver: None,
            proof_verifier: Arc::new(SignatureVerifier),
            trusted_issuers: TrustedIssuers::default(),
            entry_point: TokenType::SiopPresentationExchange,
            expected: BTreeMap::new(),
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }
}

impl ValidatorBuilder {
    /// Start from a [ValidatorConfig]: a universal resolver reached over
    /// `reqwest`, with the configured cache lifetime, and the default
    /// [SignatureVerifier].
    pub fn from_config(config: ValidatorConfig) -> Result<Self> {
        let ValidatorConfig {
            resolver,
            did_cache_ttl_secs,
            entry_point,
            trusted_issuers,
            expected,
            clock_skew_secs,
        } = config;

        let client = Arc::new(ReqwestClient::new()?);
        let resolver = ManagedHttpResolver::with_ttl(
            &resolver,
            client,
            Duration::from_secs(did_cache_ttl_secs),
        );

        Ok(Self {
            resolver: Some(Arc::new(resolver)),
            trusted_issuers,
            entry_point,
            expected,
            clock_skew: Duration::from_secs(clock_skew_secs),
            ..Self::default()
        })
    }

    /// Build the validator.
    pub fn build(self) -> Result<Validator> {
        let Self {
            resolver,
            proof_verifier,
            trusted_issuers,
            entry_point,
            expected,
            clock_skew,
        } = self;

        let Some(resolver) = resolver else {
            bail!("DID resolver is required, see `with_resolver`")
        };

        // Tokens addressed to a relying party are only accepted for this one.
        let addressed = match entry_point {
            TokenType::IdToken | TokenType::SiopPresentationExchange => vec![entry_point],
            TokenType::SiopIssuance => vec![entry_point, TokenType::IdToken],
            TokenType::VerifiablePresentation | TokenType::VerifiableCredential => vec![],
        };
        for token_type in addressed {
            if expected
                .get(&token_type)
                .and_then(|expected| expected.audience.as_ref())
                .is_none()
            {
                bail!("an expected audience for {token_type} is required, see `with_expected`")
            }
        }

        Ok(Validator {
            entry_point,
            options: Arc::new(Options {
                resolver,
                proof_verifier,
                trusted_issuers,
                expected,
                clock_skew,
            }),
        })
    }

    /// Set the [DidResolver] used to find the keys tokens are signed with.
    pub fn with_resolver(mut self, resolver: Arc<dyn DidResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Replace the default [SignatureVerifier], e.g. to accept linked-data
    /// proofs.
    pub fn with_proof_verifier(mut self, proof_verifier: Arc<dyn ProofVerifier>) -> Self {
        self.proof_verifier = proof_verifier;
        self
    }

    /// Set the issuers trusted per credential type. Credential types without an
    /// entry trust nobody.
    pub fn with_trusted_issuers(mut self, trusted_issuers: TrustedIssuers) -> Self {
        self.trusted_issuers = trusted_issuers;
        self
    }

    /// Set the token type the seed token is validated as.
    pub fn with_entry_point(mut self, entry_point: TokenType) -> Self {
        self.entry_point = entry_point;
        self
    }

    /// Set what tokens validated as `token_type` must contain.
    pub fn with_expected(mut self, token_type: TokenType, expected: Expected) -> Self {
        self.expected.insert(token_type, expected);
        self
    }

    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }
}
