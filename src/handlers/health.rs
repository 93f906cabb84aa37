// Health check endpoint handler implementation

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::handlers::AppState;

/// Handler for GET /health - translates the aggregated health snapshot into
/// a wire response. A down dependency still yields 200; only a failure to
/// encode a report produces a server error.
pub async fn health_check(State(state): State<AppState>) -> Response {
    match state.check_health().await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "error checking health");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}
