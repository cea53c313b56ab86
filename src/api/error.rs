//! Error responses
//!
//! Every failure leaves the API as `{"errorMessage": "..."}` carrying the
//! collaborator's own message.

use crate::core::BlockchainError;
use crate::mining::MempoolError;
use crate::network::PeerError;
use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// The response for any request no route matches
    pub fn no_route(method: &Method, path: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("no route for {} {}", method, path),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error_message: self.message,
            }),
        )
            .into_response()
    }
}

impl From<BlockchainError> for ApiError {
    fn from(err: BlockchainError) -> Self {
        let status = match err {
            BlockchainError::BlockNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<MempoolError> for ApiError {
    fn from(err: MempoolError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<PeerError> for ApiError {
    fn from(err: PeerError) -> Self {
        let status = match err {
            PeerError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            PeerError::ConnectionFailed(_) | PeerError::Disconnected => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.to_string())
    }
}
