//! Status and liveness handlers.

use axum::Json;
use common::provisioning::StatusResponse;

/// Message returned by `GET /`.
pub const SERVER_RUNNING_MESSAGE: &str = "Server is running!";

/// `GET /`: the status body front ends poll before joining.
pub async fn server_status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: true,
        message: SERVER_RUNNING_MESSAGE.to_string(),
    })
}

/// Liveness probe. Checks nothing beyond the process answering.
pub async fn health_check() -> &'static str {
    "OK"
}
