use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value as Json};
use siop_validator::{
    core::{claim_token::TokenType, expected::Expected, trust::TrustedIssuers},
    did::{DidResolution, DidResolver, ResolutionError, StaticResolver},
};

mod fixtures;

use fixtures::{Fixture, Identity, IDENTITY_CARD_PATH, REQUESTOR, RESPONDER, SIOP_JTI};

#[tokio::test]
async fn jwt_response() {
    let fixture = Fixture::new();
    let validator = fixture.validator(fixture.trusted_issuers());

    let vp = fixture.jwt_vp().await;
    let siop = fixture.siop(&fixture.siop_payload(Json::String(vp))).await;

    let response = validator.validate(&siop).await.unwrap();
    assert!(response.result(), "{:?}", response.detailed_error());
    assert_eq!(response.status(), 200);
    assert_eq!(response.detailed_error(), None);

    let result = response.validation_result().unwrap();
    assert_eq!(result.did.as_deref(), Some(RESPONDER));
    assert_eq!(result.siop_jti.as_deref(), Some(SIOP_JTI));
    assert!(result.verifiable_presentations.contains_key("IdentityCard"));
    assert_eq!(
        result.verifiable_credentials["IdentityCard"]["givenName"],
        "Jules"
    );
}

#[tokio::test]
async fn jwt_response_rejections() {
    let fixture = Fixture::new();
    let validator = fixture.validator(fixture.trusted_issuers());
    let vp = fixture.jwt_vp().await;
    let payload = fixture.siop_payload(Json::String(vp));

    // Remove presentation_submission
    let mut modified = payload.clone();
    modified.as_object_mut().unwrap().remove("presentation_submission");
    let response = validator.validate(&fixture.siop(&modified).await).await.unwrap();
    assert!(!response.result());
    assert_eq!(response.status(), 403);
    assert_eq!(
        response.detailed_error(),
        Some("Verifiable credential 'IdentityCard' is missing from the input request")
    );

    // Remove tokens
    let mut modified = payload.clone();
    modified["presentation_submission"]
        .as_object_mut()
        .unwrap()
        .remove("attestations");
    let response = validator.validate(&fixture.siop(&modified).await).await.unwrap();
    assert!(!response.result());
    assert_eq!(
        response.detailed_error().unwrap(),
        format!(
            "The SIOP presentation exchange response has descriptor_map with id 'IdentityCard'. This path '{IDENTITY_CARD_PATH}' did not return a token."
        )
    );

    // Remove path
    let mut modified = payload.clone();
    modified["presentation_submission"]["descriptor_map"][0]
        .as_object_mut()
        .unwrap()
        .remove("path");
    let response = validator.validate(&fixture.siop(&modified).await).await.unwrap();
    assert!(!response.result());
    assert_eq!(
        response.detailed_error(),
        Some("The SIOP presentation exchange response has descriptor_map with id 'IdentityCard'. No path property found.")
    );
}

#[tokio::test]
async fn tampered_response() {
    let fixture = Fixture::new();
    let validator = fixture.validator(fixture.trusted_issuers());
    let vp = fixture.jwt_vp().await;
    let siop = fixture.siop(&fixture.siop_payload(Json::String(vp))).await;

    let response = validator.validate(&format!("{siop}a")).await.unwrap();
    assert!(!response.result());
    assert_eq!(response.status(), 403);
    assert_eq!(
        response.detailed_error(),
        Some("The presented siopPresentationExchange is has an invalid signature")
    );
}

#[tokio::test]
async fn wrong_audience() {
    let fixture = Fixture::new();
    let validator = fixture.validator(fixture.trusted_issuers());
    let vp = fixture.jwt_vp().await;
    let mut payload = fixture.siop_payload(Json::String(vp));
    payload["aud"] = json!("https://other.example.com");

    let response = validator.validate(&fixture.siop(&payload).await).await.unwrap();
    assert_eq!(
        response.detailed_error(),
        Some("Wrong or missing aud property in siopPresentationExchange. Expected 'https://requestor.example.com'")
    );
}

#[tokio::test]
async fn presentation_from_someone_else() {
    let fixture = Fixture::new();
    let mallory = Identity::p256("did:test:mallory");
    let validator = fixture
        .builder()
        .with_resolver(Arc::new(StaticResolver::new([
            fixture.responder.document(),
            fixture.issuer.document(),
            mallory.document(),
        ])))
        .with_trusted_issuers(fixture.trusted_issuers())
        .build()
        .unwrap();

    let mut vp_payload = fixture.jwt_vp_payload(vec![Json::String(fixture.jwt_vc().await)]);
    vp_payload["iss"] = json!(mallory.did);
    let vp = mallory.sign(&vp_payload).await;
    let siop = fixture.siop(&fixture.siop_payload(Json::String(vp))).await;

    let response = validator.validate(&siop).await.unwrap();
    assert_eq!(
        response.detailed_error(),
        Some("Wrong or missing iss property in verifiablePresentation. Expected 'did:test:responder'")
    );
}

#[tokio::test]
async fn presentation_wraps_something_else() {
    let fixture = Fixture::new();
    let validator = fixture.validator(fixture.trusted_issuers());

    let id_token = fixture
        .issuer
        .sign(&json!({"iss": "https://op.example.com", "aud": "https://requestor.example.com"}))
        .await;
    let vp = fixture
        .responder
        .sign(&fixture.jwt_vp_payload(vec![Json::String(id_token)]))
        .await;
    let siop = fixture.siop(&fixture.siop_payload(Json::String(vp))).await;

    let response = validator.validate(&siop).await.unwrap();
    assert_eq!(
        response.detailed_error(),
        Some("The verifiable presentation contains a token that is not a verifiable credential")
    );
}

#[tokio::test]
async fn expired_credential() {
    let fixture = Fixture::new();
    let validator = fixture.validator(fixture.trusted_issuers());

    let mut vc_payload = fixture.jwt_vc_payload();
    vc_payload["exp"] = json!(fixtures::now() - 3600);
    let vc = fixture.issuer.sign(&vc_payload).await;
    let vp = fixture
        .responder
        .sign(&fixture.jwt_vp_payload(vec![Json::String(vc)]))
        .await;
    let siop = fixture.siop(&fixture.siop_payload(Json::String(vp))).await;

    let response = validator.validate(&siop).await.unwrap();
    assert_eq!(
        response.detailed_error(),
        Some("The presented verifiableCredential is expired")
    );
}

#[tokio::test]
async fn unknown_issuer() {
    let fixture = Fixture::new();
    let stranger = Identity::p256("did:test:stranger");
    let validator = fixture.validator(fixture.trusted_issuers());

    let mut vc_payload = fixture.jwt_vc_payload();
    vc_payload["iss"] = json!(stranger.did);
    let vc = stranger.sign(&vc_payload).await;
    let vp = fixture
        .responder
        .sign(&fixture.jwt_vp_payload(vec![Json::String(vc)]))
        .await;
    let siop = fixture.siop(&fixture.siop_payload(Json::String(vp))).await;

    let response = validator.validate(&siop).await.unwrap();
    assert_eq!(response.status(), 403);
    assert_eq!(
        response.detailed_error(),
        Some("Could not resolve did:test:stranger")
    );
}

#[tokio::test]
async fn json_ld_response() {
    let fixture = Fixture::new();
    let siop = fixture.siop(&fixture.siop_payload(fixture.json_ld_vc())).await;

    let validator = fixture.validator(fixture.trusted_issuers());
    let response = validator.validate(&siop).await.unwrap();
    assert!(response.result(), "{:?}", response.detailed_error());
    assert_eq!(
        response.validation_result().unwrap().verifiable_credentials["IdentityCard"]["id"],
        RESPONDER
    );

    // wrong issuer
    let validator = fixture.validator(TrustedIssuers::new().with("IdentityCard", vec![]));
    let response = validator.validate(&siop).await.unwrap();
    assert_eq!(
        response.detailed_error(),
        Some(r#"The verifiable credential with type 'IdentityCard' is not from a trusted issuer '{"IdentityCard":[]}'"#)
    );

    let validator =
        fixture.validator(TrustedIssuers::new().with("IdentityCard", vec!["some did".into()]));
    let response = validator.validate(&siop).await.unwrap();
    assert_eq!(
        response.detailed_error(),
        Some(r#"The verifiable credential with type 'IdentityCard' is not from a trusted issuer '{"IdentityCard":["some did"]}'"#)
    );

    // no entry for the type at all
    let validator = fixture.validator(TrustedIssuers::new());
    let response = validator.validate(&siop).await.unwrap();
    assert_eq!(
        response.detailed_error(),
        Some("The verifiable credential with type 'IdentityCard' is not from a trusted issuer '{}'")
    );
}

#[tokio::test]
async fn json_ld_subject_is_not_the_presenter() {
    let fixture = Fixture::new();
    let mut vc = fixture.json_ld_vc();
    vc["credentialSubject"]["id"] = json!("did:test:someone-else");
    let siop = fixture.siop(&fixture.siop_payload(vc)).await;

    let response = fixture
        .validator(fixture.trusted_issuers())
        .validate(&siop)
        .await
        .unwrap();
    assert_eq!(
        response.detailed_error(),
        Some("The verifiable credential with type 'IdentityCard', the id in the credentialSubject property does not match the presenter DID: did:test:responder")
    );
}

#[tokio::test]
async fn json_ld_proof_structure() {
    let fixture = Fixture::new();
    let validator = fixture.validator(fixture.trusted_issuers());

    let mut vc = fixture.json_ld_vc();
    vc.as_object_mut().unwrap().remove("proof");
    let siop = fixture.siop(&fixture.siop_payload(vc)).await;
    let response = validator.validate(&siop).await.unwrap();
    assert_eq!(
        response.detailed_error(),
        Some("The proof is not available in the json ld payload")
    );

    let mut vc = fixture.json_ld_vc();
    vc["proof"]
        .as_object_mut()
        .unwrap()
        .remove("verificationMethod");
    let siop = fixture.siop(&fixture.siop_payload(vc)).await;
    let response = validator.validate(&siop).await.unwrap();
    assert_eq!(
        response.detailed_error(),
        Some("The proof does not contain the verificationMethod in the json ld payload")
    );

    let mut vc = fixture.json_ld_vc();
    vc["proof"]["jws"] = json!("invalid");
    let siop = fixture.siop(&fixture.siop_payload(vc)).await;
    let response = validator.validate(&siop).await.unwrap();
    assert_eq!(
        response.detailed_error(),
        Some("The presented verifiableCredential is has an invalid signature")
    );
}

#[tokio::test]
async fn json_ld_two_subjects() {
    let fixture = Fixture::new();
    let mut vc = fixture.json_ld_vc();
    vc["credentialSubject"] = json!([
        {"id": RESPONDER, "givenName": "Jules"},
        {"givenName": "Vincent", "familyName": "Vega"}
    ]);
    let siop = fixture.siop(&fixture.siop_payload(vc)).await;

    let response = fixture
        .validator(fixture.trusted_issuers())
        .validate(&siop)
        .await
        .unwrap();
    assert!(response.result(), "{:?}", response.detailed_error());
}

#[tokio::test]
async fn revalidation_is_idempotent() {
    let fixture = Fixture::new();
    let validator = fixture.validator(fixture.trusted_issuers());
    let vp = fixture.jwt_vp().await;
    let siop = fixture.siop(&fixture.siop_payload(Json::String(vp))).await;

    let first = validator.validate(&siop).await.unwrap();
    let second = validator.validate(&siop).await.unwrap();
    assert_eq!(first, second);

    let tampered = format!("{siop}a");
    let first = validator.validate(&tampered).await.unwrap();
    let second = validator.validate(&tampered).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn concurrent_validations_are_independent() {
    let fixture = Fixture::new();
    let validator = fixture.validator(fixture.trusted_issuers());
    let good = fixture
        .siop(&fixture.siop_payload(Json::String(fixture.jwt_vp().await)))
        .await;
    let bad = format!("{good}a");

    let mut handles = Vec::new();
    for i in 0..8 {
        let validator = validator.clone();
        let raw = if i % 2 == 0 { good.clone() } else { bad.clone() };
        handles.push(tokio::spawn(async move {
            (i, validator.validate(&raw).await.unwrap())
        }));
    }

    for handle in handles {
        let (i, response) = handle.await.unwrap();
        assert_eq!(response.result(), i % 2 == 0, "{:?}", response.detailed_error());
    }
}

fn diploma_payload(fixture: &Fixture, issuer: &Identity) -> Json {
    let mut payload = fixture.jwt_vc_payload();
    payload["iss"] = json!(issuer.did);
    payload["vc"]["type"] = json!(["VerifiableCredential", "Diploma"]);
    payload["vc"]["credentialSubject"] = json!({"id": RESPONDER, "degree": "BSc"});
    payload
}

#[tokio::test]
async fn credential_must_match_its_descriptor() {
    let fixture = Fixture::new();
    let validator = fixture
        .builder()
        .with_expected(
            TokenType::SiopPresentationExchange,
            Expected::audience(REQUESTOR).with_credential_types(vec!["IdentityCard".into()]),
        )
        .with_trusted_issuers(
            fixture
                .trusted_issuers()
                .with("Diploma", vec![fixture.issuer.did.clone()]),
        )
        .build()
        .unwrap();

    let diploma = fixture
        .issuer
        .sign(&diploma_payload(&fixture, &fixture.issuer))
        .await;
    let vp = fixture
        .responder
        .sign(&fixture.jwt_vp_payload(vec![Json::String(diploma)]))
        .await;
    let siop = fixture.siop(&fixture.siop_payload(Json::String(vp))).await;

    let response = validator.validate(&siop).await.unwrap();
    assert!(!response.result());
    assert_eq!(response.status(), 403);
    assert_eq!(
        response.detailed_error(),
        Some("The verifiable credential with type 'Diploma' is presented as 'IdentityCard'")
    );
}

#[tokio::test]
async fn empty_presentation_under_a_descriptor() {
    let fixture = Fixture::new();
    let validator = fixture.validator(fixture.trusted_issuers());

    let vp = fixture
        .responder
        .sign(&fixture.jwt_vp_payload(vec![]))
        .await;
    let siop = fixture.siop(&fixture.siop_payload(Json::String(vp))).await;

    let response = validator.validate(&siop).await.unwrap();
    assert!(!response.result());
    assert_eq!(
        response.detailed_error(),
        Some("The verifiable presentation presented as 'IdentityCard' does not contain a verifiable credential")
    );
}

/// Remembers every DID it was asked for.
#[derive(Debug)]
struct RecordingResolver {
    inner: StaticResolver,
    resolved: Mutex<Vec<String>>,
}

#[async_trait]
impl DidResolver for RecordingResolver {
    async fn resolve(&self, did: &str) -> Result<DidResolution, ResolutionError> {
        self.resolved.lock().unwrap().push(did.to_owned());
        self.inner.resolve(did).await
    }
}

#[tokio::test]
async fn first_rejection_ends_the_run() {
    let fixture = Fixture::new();
    let registrar = Identity::p256("did:test:registrar");
    let resolver = Arc::new(RecordingResolver {
        inner: StaticResolver::new([
            fixture.responder.document(),
            fixture.issuer.document(),
            registrar.document(),
        ]),
        resolved: Mutex::new(Vec::new()),
    });
    let validator = fixture
        .builder()
        .with_resolver(resolver.clone())
        .with_trusted_issuers(
            fixture
                .trusted_issuers()
                .with("Diploma", vec![registrar.did.clone()]),
        )
        .build()
        .unwrap();

    let diploma = registrar.sign(&diploma_payload(&fixture, &registrar)).await;
    let siop_with = |identity_card: String| {
        let mut payload = fixture.siop_payload(Json::String(identity_card));
        let submission = &mut payload["presentation_submission"];
        submission["descriptor_map"]
            .as_array_mut()
            .unwrap()
            .push(json!({
                "id": "Diploma",
                "format": "jwt_vc",
                "path": "$.presentation_submission.attestations.presentations.Diploma"
            }));
        submission["attestations"]["presentations"]["Diploma"] = json!(diploma);
        payload
    };

    // Both descriptors are visited when everything holds.
    let vp = fixture.jwt_vp().await;
    let response = validator
        .validate(&fixture.siop(&siop_with(vp.clone())).await)
        .await
        .unwrap();
    assert!(response.result(), "{:?}", response.detailed_error());
    assert!(resolver.resolved.lock().unwrap().contains(&registrar.did));
    assert_eq!(
        response.validation_result().unwrap().verifiable_credentials["Diploma"]["degree"],
        "BSc"
    );

    // The first descriptor fails, so the second is never looked at.
    resolver.resolved.lock().unwrap().clear();
    let response = validator
        .validate(&fixture.siop(&siop_with(format!("{vp}a"))).await)
        .await
        .unwrap();
    assert_eq!(
        response.detailed_error(),
        Some("The presented verifiablePresentation is has an invalid signature")
    );
    assert_eq!(
        *resolver.resolved.lock().unwrap(),
        [RESPONDER, RESPONDER]
    );
}
