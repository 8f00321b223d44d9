//! This library validates the signed artifacts a relying party receives in a
//! self-issued OpenID exchange: SIOP responses, verifiable presentations,
//! verifiable credentials and ID tokens, each possibly nested inside another.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use siop_validator::core::{expected::Expected, trust::TrustedIssuers};
//! use siop_validator::verifier::Validator;
//! use siop_validator::core::claim_token::TokenType;
//!
//! let validator = Validator::builder()
//!     .with_resolver(resolver)
//!     .with_trusted_issuers(
//!         TrustedIssuers::new().with("IdentityCard", vec!["did:ion:issuer".into()]),
//!     )
//!     .with_expected(
//!         TokenType::SiopPresentationExchange,
//!         Expected::audience("https://requestor.example.com"),
//!     )
//!     .build()?;
//!
//! let response = validator.validate(&siop_response).await?;
//! if response.result() {
//!     let claims = response.validation_result();
//! } else {
//!     println!("{:?}", response.detailed_error());
//! }
//! ```
//!
//! A validator can also be assembled from a JSON document, see
//! [`ValidatorConfig`] and [`ValidatorBuilder::from_config`].
//!
//! [`ValidatorConfig`]: crate::config::ValidatorConfig
//! [`ValidatorBuilder::from_config`]: crate::verifier::ValidatorBuilder::from_config
//!
//! # Validation Overview
//!
//! 1. *Classification*: the raw token is decoded, without checking any
//!    signature, and classified by shape into a [`TokenType`].
//! 2. *Queue*: the token is validated as the configured entry point. Tokens
//!    found inside it (the credentials behind a `descriptor_map`, the
//!    credentials wrapped by a presentation, the attestations of an issuance
//!    response) are queued and validated in discovery order.
//! 3. *Verdict*: the first rejected token ends the run and its diagnostic
//!    becomes the `detailedError` of the response. When every token passes,
//!    the verified claims are returned in a [`ValidationResult`].
//!
//! Signing keys are found through a [`DidResolver`]; signatures are checked by
//! a [`ProofVerifier`].
//!
//! [`TokenType`]: crate::core::claim_token::TokenType
//! [`ValidationResult`]: crate::core::response::ValidationResult
//! [`DidResolver`]: crate::did::DidResolver
//! [`ProofVerifier`]: crate::proof::ProofVerifier

pub mod config;
pub mod core;
pub mod did;
pub mod proof;
pub mod verifier;
pub use serde_json_path::JsonPath;
