//! Federation endpoints served to peers.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use entente_federation::{FederationError, FederationStatus};
use entente_types::wire::{
    AttestationsResponse, ChallengeRequest, ChallengeResponse, MembershipRequest,
    MembershipResponse, PolicyListResponse, PolicyPushResponse, PolicyQuery, STATUS_ACCEPTED,
    STATUS_REJECTED,
};
use entente_types::{FederatedPolicy, FederationAgreement, OrganizationIdentity};
use thiserror::Error;

use crate::AppState;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid challenge encoding: {0}")]
    InvalidChallenge(#[from] hex::FromHexError),
    #[error("agreement not found: {0}")]
    AgreementNotFound(String),
    #[error("federation error: {0}")]
    Federation(#[from] FederationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidChallenge(_) => StatusCode::BAD_REQUEST,
            ApiError::AgreementNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Federation(FederationError::UnknownAgreement(_))
            | ApiError::Federation(FederationError::NoInvitation { .. }) => StatusCode::NOT_FOUND,
            ApiError::Federation(FederationError::NotLeader { .. }) => StatusCode::FORBIDDEN,
            ApiError::Federation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("federation request failed: {}", self);
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Handler for `GET /.well-known/acgs-federation`.
pub async fn well_known_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<OrganizationIdentity> {
    Json(state.governor.identity())
}

/// Handler for `GET /api/v1/compliance/attestations`.
pub async fn attestations_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<AttestationsResponse> {
    let governor = &state.governor;
    Json(AttestationsResponse {
        attestations: governor.attestations(),
        governance_hash: Some(governor.settings().governance_hash.clone()),
    })
}

/// Handler for `GET /api/v1/federation/policies`.
pub async fn list_policies_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<PolicyQuery>,
) -> Json<PolicyListResponse> {
    let governor = &state.governor;
    Json(PolicyListResponse {
        policies: governor
            .with_policy_sync(|sync| sync.shared_policies_since(query.since_version.as_deref())),
        governance_hash: Some(governor.settings().governance_hash.clone()),
    })
}

/// Handler for `POST /api/v1/federation/policies`.
///
/// Answers 200 `accepted` when the policy verifies against its owner's
/// registered key, 422 `rejected` otherwise.
pub async fn push_policy_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(policy): Json<FederatedPolicy>,
) -> (StatusCode, Json<PolicyPushResponse>) {
    let governor = &state.governor;
    let accepted = governor.with_policy_sync_mut(|sync| sync.accept_remote_policy(&policy));
    let (status, label) = if accepted {
        (StatusCode::OK, STATUS_ACCEPTED)
    } else {
        (StatusCode::UNPROCESSABLE_ENTITY, STATUS_REJECTED)
    };
    tracing::info!(
        policy_id = %policy.policy_id,
        owner = %policy.owner_org_id,
        status = label,
        "policy push received"
    );
    (
        status,
        Json(PolicyPushResponse {
            status: label.to_string(),
            governance_hash: Some(governor.settings().governance_hash.clone()),
        }),
    )
}

/// Handler for `POST /api/v1/federation/challenge`.
pub async fn challenge_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<ChallengeRequest>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let challenge = hex::decode(&request.challenge)?;
    let governor = &state.governor;
    tracing::debug!(challenger = %request.challenger_org_id, "answering challenge");
    Ok(Json(ChallengeResponse {
        response: hex::encode(governor.respond_to_challenge(&challenge)),
        governance_hash: Some(governor.settings().governance_hash.clone()),
    }))
}

/// Handler for `GET /api/v1/federation/status`.
pub async fn status_handler(Extension(state): Extension<Arc<AppState>>) -> Json<FederationStatus> {
    Json(state.governor.get_federation_status())
}

/// Handler for `GET /api/v1/federation/agreements/{agreementId}`.
pub async fn get_agreement_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agreement_id): Path<String>,
) -> Result<Json<FederationAgreement>, ApiError> {
    state
        .governor
        .agreement(&agreement_id)
        .map(Json)
        .ok_or(ApiError::AgreementNotFound(agreement_id))
}

/// Handler for `POST /api/v1/federation/agreements/{agreementId}/members`.
pub async fn accept_member_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agreement_id): Path<String>,
    Json(request): Json<MembershipRequest>,
) -> Result<(StatusCode, Json<MembershipResponse>), ApiError> {
    let governor = &state.governor;
    let accepted = governor.accept_member(&agreement_id, &request.org_id, &request.signature)?;
    let (status, label) = if accepted {
        (StatusCode::OK, STATUS_ACCEPTED)
    } else {
        (StatusCode::UNPROCESSABLE_ENTITY, STATUS_REJECTED)
    };
    Ok((
        status,
        Json(MembershipResponse {
            status: label.to_string(),
            governance_hash: Some(governor.settings().governance_hash.clone()),
        }),
    ))
}
