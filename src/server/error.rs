use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde_json::json;

use crate::error::DeepWorkError;

impl DeepWorkError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DeepWorkError::InvalidConfirmation => StatusCode::FORBIDDEN,
            DeepWorkError::InvalidBreakDuration(_) => StatusCode::BAD_REQUEST,
            DeepWorkError::OsPermission { .. } | DeepWorkError::HostsFile { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            DeepWorkError::ExternalService { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for DeepWorkError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("request failed: {self}");
        }

        let body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        (status, Json(body)).into_response()
    }
}
