//! Trust handshake against a live HTTP peer.
//!
//! Each test binds an axum router on an ephemeral port that serves the
//! well-known identity document, the attestation listing and the challenge
//! endpoint, then drives `TrustEstablishmentProtocol` against it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use entente_trust::TrustEstablishmentProtocol;
use entente_types::wire::{
    AttestationsResponse, ChallengeRequest, ChallengeResponse, ATTESTATIONS_PATH, CHALLENGE_PATH,
    WELL_KNOWN_PATH,
};
use entente_types::{
    ComplianceAttestation, FederationKey, FederationSettings, OrganizationIdentity,
    OrganizationRole, TrustLevel,
};

fn local_settings() -> FederationSettings {
    FederationSettings {
        request_timeout_secs: 5,
        discovery_scheme: "http".to_string(),
        ..Default::default()
    }
}

fn attestation(org_id: &str, framework: &str, valid_days: i64) -> ComplianceAttestation {
    let now = Utc::now();
    ComplianceAttestation {
        attestation_id: format!("att-{framework}"),
        org_id: org_id.to_string(),
        framework: framework.to_string(),
        attested_at: now - Duration::days(30),
        valid_until: now + Duration::days(valid_days),
        auditor_org_id: Some("auditor-1".to_string()),
        evidence_hash: "cafe".to_string(),
        signature: String::new(),
        metadata: BTreeMap::new(),
    }
}

/// Starts a peer named `org-a` and returns its domain (`127.0.0.1:port`).
async fn spawn_peer(
    key: FederationKey,
    attestations: Vec<ComplianceAttestation>,
    claimed_domain: Option<&str>,
) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let domain = addr.to_string();

    let identity = OrganizationIdentity {
        org_id: "org-a".to_string(),
        name: "Org A".to_string(),
        domain: claimed_domain.unwrap_or(&domain).to_string(),
        public_key: key.verification_key(),
        federation_endpoint: format!("http://{domain}"),
        role: OrganizationRole::Leader,
        trust_level: TrustLevel::Full,
        compliance_frameworks: BTreeSet::from(["SOC2".to_string()]),
        last_verified: None,
        metadata: BTreeMap::new(),
    };

    let responder = Arc::new(
        TrustEstablishmentProtocol::new("org-a", key, local_settings()).unwrap(),
    );

    let app = Router::new()
        .route(
            WELL_KNOWN_PATH,
            get(move || {
                let identity = identity.clone();
                async move { Json(identity) }
            }),
        )
        .route(
            ATTESTATIONS_PATH,
            get(move || {
                let attestations = attestations.clone();
                async move {
                    Json(AttestationsResponse {
                        attestations,
                        governance_hash: None,
                    })
                }
            }),
        )
        .route(
            CHALLENGE_PATH,
            post(move |Json(request): Json<ChallengeRequest>| {
                let responder = responder.clone();
                async move {
                    let challenge = hex::decode(&request.challenge).unwrap_or_default();
                    Json(ChallengeResponse {
                        response: hex::encode(responder.respond_to_challenge(&challenge)),
                        governance_hash: None,
                    })
                }
            }),
        );

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    domain
}

#[tokio::test]
async fn discovery_returns_identity_at_basic_trust() {
    let key = FederationKey::generate();
    let domain = spawn_peer(key.clone(), vec![], None).await;
    let trust = TrustEstablishmentProtocol::new("org-b", FederationKey::generate(), local_settings())
        .unwrap();

    let identity = trust
        .initiate_discovery(&domain)
        .await
        .expect("discovery should succeed");

    assert_eq!(identity.org_id, "org-a");
    assert_eq!(identity.public_key, key.verification_key());
    assert_eq!(identity.trust_level, TrustLevel::Basic, "advertised trust must be discarded");
}

#[tokio::test]
async fn discovery_of_unreachable_domain_returns_none() {
    let trust = TrustEstablishmentProtocol::new("org-b", FederationKey::generate(), local_settings())
        .unwrap();

    assert!(trust.initiate_discovery("127.0.0.1:1").await.is_none());
}

#[tokio::test]
async fn discovery_rejects_identity_claiming_another_domain() {
    let domain = spawn_peer(FederationKey::generate(), vec![], Some("evil.example.com")).await;
    let trust = TrustEstablishmentProtocol::new("org-b", FederationKey::generate(), local_settings())
        .unwrap();

    assert!(trust.initiate_discovery(&domain).await.is_none());
}

#[tokio::test]
async fn challenge_round_trip_over_http_verifies() {
    let domain = spawn_peer(FederationKey::generate(), vec![], None).await;
    let trust = TrustEstablishmentProtocol::new("org-b", FederationKey::generate(), local_settings())
        .unwrap();

    let identity = trust.initiate_discovery(&domain).await.unwrap();
    let challenge = trust.create_challenge(&identity.org_id);
    let response = trust
        .request_challenge_response(&identity, &challenge)
        .await
        .expect("peer should answer");

    assert_eq!(response.len(), 40);
    assert!(trust.verify_challenge_response(&identity.org_id, &response, &identity.public_key));
    assert!(
        !trust.verify_challenge_response(&identity.org_id, &response, &identity.public_key),
        "a consumed challenge must not verify twice"
    );
}

#[tokio::test]
async fn compliance_requires_every_framework_currently_valid() {
    let attestations = vec![
        attestation("org-a", "SOC2", 30),
        attestation("org-a", "GDPR", -1),
        attestation("org-z", "HIPAA", 30),
    ];
    let domain = spawn_peer(FederationKey::generate(), attestations, None).await;
    let trust = TrustEstablishmentProtocol::new("org-b", FederationKey::generate(), local_settings())
        .unwrap();
    let identity = trust.initiate_discovery(&domain).await.unwrap();

    assert!(trust.verify_compliance(&identity, &["SOC2".to_string()]).await);
    assert!(trust.verify_compliance(&identity, &[]).await);
    assert!(
        !trust.verify_compliance(&identity, &["GDPR".to_string()]).await,
        "expired attestation must not count"
    );
    assert!(
        !trust.verify_compliance(&identity, &["HIPAA".to_string()]).await,
        "another organization's attestation must not count"
    );
}

#[tokio::test]
async fn compliance_fails_closed_when_peer_unreachable() {
    let trust = TrustEstablishmentProtocol::new("org-b", FederationKey::generate(), local_settings())
        .unwrap();
    let identity = OrganizationIdentity {
        org_id: "org-gone".to_string(),
        name: "Gone".to_string(),
        domain: "127.0.0.1:1".to_string(),
        public_key: FederationKey::generate().verification_key(),
        federation_endpoint: "http://127.0.0.1:1".to_string(),
        role: OrganizationRole::Member,
        trust_level: TrustLevel::Basic,
        compliance_frameworks: BTreeSet::new(),
        last_verified: None,
        metadata: BTreeMap::new(),
    };

    assert!(!trust.verify_compliance(&identity, &["SOC2".to_string()]).await);
}
