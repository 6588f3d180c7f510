//! Entente server library logic.
//!
//! Exposes a [`FederationGovernor`] to peers over HTTP. Handlers only
//! translate requests into governor calls.

pub mod api_federation;
pub mod config;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use entente_federation::{FederationError, FederationGovernor};
use entente_types::wire::{
    AGREEMENTS_PATH, ATTESTATIONS_PATH, CHALLENGE_PATH, POLICIES_PATH, STATUS_PATH,
    WELL_KNOWN_PATH,
};
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::config::{Config, ConfigError};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The local organization's governor. It locks internally and never
    /// across a network call, so handlers share it without an outer lock.
    pub governor: Arc<FederationGovernor>,
}

impl AppState {
    /// Wraps `governor` for sharing between handlers.
    pub fn new(governor: FederationGovernor) -> Self {
        Self {
            governor: Arc::new(governor),
        }
    }
}

/// Errors that prevent a node from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The organization section is unusable.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The governor could not be constructed.
    #[error("federation error: {0}")]
    Federation(#[from] FederationError),
}

/// Builds the governor described by `config` and publishes the configured
/// attestations. Attestations naming another organization are skipped.
///
/// # Errors
///
/// Returns [`StartupError`] if the key is malformed or the governor cannot
/// be built.
pub fn build_governor(config: &Config) -> Result<FederationGovernor, StartupError> {
    let organization = &config.organization;
    let key = organization.federation_key()?;
    let identity = organization.identity(&key);
    let governor = FederationGovernor::new(identity, key, config.federation.clone())?;

    let mut published = 0;
    for attestation in &organization.attestations {
        if governor.add_attestation(attestation.clone()) {
            published += 1;
        }
    }
    tracing::info!(
        org_id = %organization.org_id,
        published,
        configured = organization.attestations.len(),
        "loaded compliance attestations"
    );

    Ok(governor)
}

/// Maximum request body size (1 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(WELL_KNOWN_PATH, get(api_federation::well_known_handler))
        .route(
            ATTESTATIONS_PATH,
            get(api_federation::attestations_handler),
        )
        .route(
            POLICIES_PATH,
            get(api_federation::list_policies_handler).post(api_federation::push_policy_handler),
        )
        .route(CHALLENGE_PATH, post(api_federation::challenge_handler))
        .route(STATUS_PATH, get(api_federation::status_handler))
        .route(
            &format!("{AGREEMENTS_PATH}/{{agreementId}}"),
            get(api_federation::get_agreement_handler),
        )
        .route(
            &format!("{AGREEMENTS_PATH}/{{agreementId}}/members"),
            post(api_federation::accept_member_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
