//! Health check endpoints
//!
//! - /health - Liveness probe, 200 whenever the process is serving
//! - /ready - Readiness probe, 200 only when the entity store answers its
//!   health probe within the request timeout
//! - /version - Build information captured by build.rs
//! - /status - Gateway counters and cache settings

use bytes::Bytes;
use chrono::Utc;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use super::json_response;
use crate::cache::GatewayStatsSnapshot;
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    /// 'online' or 'degraded'
    pub status: &'static str,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    /// Entity store backend ('context-broker' or 'memory')
    pub store: &'static str,
    pub mode: &'static str,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        healthy: true,
        status: "online",
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        store: state.gateway.store().kind(),
        mode: if state.args.dev_mode { "development" } else { "production" },
        timestamp: Utc::now().to_rfc3339(),
        error: None,
    }
}

/// Liveness probe
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &build_health_response(&state))
}

/// Readiness probe
pub async fn readiness_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let mut health = build_health_response(&state);
    let probe = tokio::time::timeout(state.args.request_timeout(), state.gateway.store().health()).await;

    let error = match probe {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some("entity store health probe timed out".to_string()),
    };

    match error {
        None => json_response(StatusCode::OK, &health),
        Some(error) => {
            warn!(store = health.store, error = %error, "Readiness probe failed");
            health.healthy = false;
            health.status = "degraded";
            health.error = Some(error);
            json_response(StatusCode::SERVICE_UNAVAILABLE, &health)
        }
    }
}

/// Version information response
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub commit: &'static str,
    #[serde(rename = "commitFull")]
    pub commit_full: &'static str,
    #[serde(rename = "buildTime")]
    pub build_time: &'static str,
    pub service: &'static str,
}

pub fn version_info() -> Response<Full<Bytes>> {
    let version = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "ngsi-gateway",
    };
    json_response(StatusCode::OK, &version)
}

/// Runtime status of the cache gateway
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub version: &'static str,
    pub uptime: u64,
    pub store: &'static str,
    pub ttl_secs: u64,
    pub entity_types: Vec<String>,
    pub in_flight_fetches: usize,
    pub stats: GatewayStatsSnapshot,
}

pub async fn status_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let gateway = &state.gateway;
    let status = StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        store: gateway.store().kind(),
        ttl_secs: gateway.freshness().ttl().as_secs(),
        entity_types: gateway
            .sources()
            .entity_types()
            .iter()
            .map(|t| t.to_string())
            .collect(),
        in_flight_fetches: gateway.in_flight_fetches().await,
        stats: gateway.stats(),
    };
    json_response(StatusCode::OK, &status)
}
