// Success envelope; failures go through AppError's IntoResponse

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Envelope<T> {
    success: bool,
    message: String,
    data: T,
}

/// `{success: true, message, data}` with a 2xx status.
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    message: String,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            data,
        }
    }

    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CREATED,
            message: message.into(),
            data,
        }
    }
}

/// Payload for operations that return nothing; serializes as `[]`.
pub type Empty = [(); 0];

impl ApiResponse<Empty> {
    pub fn message(message: impl Into<String>) -> Self {
        Self::ok([], message)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            success: true,
            message: self.message,
            data: self.data,
        };
        (self.status, Json(body)).into_response()
    }
}
