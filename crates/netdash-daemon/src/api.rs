//! REST API handlers

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use netdash_core::DiscoveredDevice;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::state::AppState;
use crate::{speedtest, system, tools, wol};

/// Outcome marker carried by every command-style response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Body of `GET /api/discover`
#[derive(Debug, Serialize, Deserialize)]
pub struct DiscoverResponse {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devices: Option<Vec<DiscoveredDevice>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Body of the tool endpoints (ping, nmap, speedtest, wol)
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    pub status: Status,
    pub output: String,
}

impl CommandResponse {
    fn success(output: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            output: output.into(),
        }
    }

    fn error(output: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            output: output.into(),
        }
    }
}

impl<E: std::fmt::Display> From<Result<String, E>> for CommandResponse {
    fn from(result: Result<String, E>) -> Self {
        match result {
            Ok(output) => Self::success(output),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

/// JSON error body for requests the extractors reject
fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(CommandResponse::error(message))).into_response()
}

/// Optional `?host=` parameter
#[derive(Debug, Deserialize)]
pub struct HostQuery {
    host: Option<String>,
}

impl HostQuery {
    fn host_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.host.as_deref() {
            Some(host) if !host.is_empty() => host,
            _ => default,
        }
    }
}

/// Sweep the local subnet and return every responding device
pub async fn discover(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.scanner.scan().await {
        Ok(devices) => Json(DiscoverResponse {
            status: Status::Success,
            devices: Some(devices),
            output: None,
        }),
        Err(e) => {
            warn!(error = %e, "Discovery failed");
            Json(DiscoverResponse {
                status: Status::Error,
                devices: None,
                output: Some(e.to_string()),
            })
        }
    }
}

pub async fn ping(
    State(state): State<Arc<AppState>>,
    query: Result<Query<HostQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let host = query.host_or(&state.config.tools.default_ping_host);
    info!(host = %host, "Ping requested");
    Json(CommandResponse::from(
        tools::ping(host, state.config.tools.ping_count).await,
    ))
    .into_response()
}

pub async fn nmap(
    State(state): State<Arc<AppState>>,
    query: Result<Query<HostQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let host = query.host_or(&state.config.tools.default_nmap_host);
    info!(host = %host, "Port scan requested");
    Json(CommandResponse::from(tools::nmap(host).await)).into_response()
}

/// CPU, memory and temperature snapshot
pub async fn sysinfo() -> impl IntoResponse {
    Json(system::collect().await)
}

pub async fn speedtest(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("Speed test requested");
    match speedtest::run(&state.http, &state.config.speedtest).await {
        Ok(result) => Json(CommandResponse::success(result.summary())),
        Err(e) => {
            warn!(error = %e, "Speed test failed");
            Json(CommandResponse::error(format!("{e:#}")))
        }
    }
}

/// Wake-on-LAN request body
#[derive(Debug, Deserialize)]
pub struct WolRequest {
    #[serde(default)]
    mac_address: Option<String>,
}

/// Send a magic packet to the given MAC address
pub async fn wake_on_lan(
    State(state): State<Arc<AppState>>,
    body: Result<Json<WolRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let mac = match req.mac_address.as_deref().map(str::trim) {
        Some(mac) if !mac.is_empty() => mac,
        _ => return bad_request("MAC address is required.".to_string()),
    };

    match wol::wake(mac, state.config.wol.broadcast, state.config.wol.port).await {
        Ok(_) => Json(CommandResponse::success(format!("Magic packet sent to {mac}"))).into_response(),
        Err(e) => {
            warn!(mac = %mac, error = %e, "Wake-on-LAN failed");
            Json(CommandResponse::error(e.to_string())).into_response()
        }
    }
}
