//! Maps service errors onto HTTP responses.
//!
//! Every error body is `{"error": "<user-facing message>"}` — the message
//! comes from the domain error's `Display`, which is written to be
//! actionable and to never carry provider payloads or credentials.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::domain::OrchestratorError;

pub enum ApiError {
    Domain(OrchestratorError),
    /// Missing or invalid caller credentials at the HTTP layer.
    Unauthorized(&'static str),
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        Self::Domain(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, (*message).to_string()),
            Self::Domain(err) => {
                let status = match err {
                    OrchestratorError::Validation(_) => StatusCode::BAD_REQUEST,
                    OrchestratorError::Transition(_) => StatusCode::CONFLICT,
                    OrchestratorError::Policy(_) | OrchestratorError::Forbidden => {
                        StatusCode::FORBIDDEN
                    }
                    OrchestratorError::Provision(_) => StatusCode::BAD_GATEWAY,
                    OrchestratorError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
                    OrchestratorError::NotFound | OrchestratorError::UnknownAgentProject => {
                        StatusCode::NOT_FOUND
                    }
                    OrchestratorError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!(error = ?err, "request failed");
                }
                (status, err.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::{TransitionError, ValidationError};
    use sprout_common::PrototypeStatus;

    fn status_of(err: OrchestratorError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn statuses_match_error_classes() {
        assert_eq!(
            status_of(ValidationError::EmptyBatch.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(
                TransitionError::InvalidTransition {
                    from: PrototypeStatus::Merged,
                    requested: crate::domain::Action::Submit,
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(OrchestratorError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(OrchestratorError::UnknownAgentProject),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_of(OrchestratorError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(OrchestratorError::Store(anyhow::anyhow!("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unauthorized_is_401() {
        let response = ApiError::Unauthorized("Missing identity header.").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
