use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use crate::error::ApiError;

/// Successful callback result: the value becomes the JSON body as-is.
#[derive(Debug)]
pub struct Reply<T: Serialize> {
    pub data: T,
    pub status: StatusCode,
}

impl<T: Serialize> Reply<T> {
    /// 200 OK
    pub fn ok(data: T) -> Self {
        Self::with_status(data, StatusCode::OK)
    }

    /// 201 Created
    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }

    pub fn with_status(data: T, status: StatusCode) -> Self {
        Self { data, status }
    }
}

impl Reply<()> {
    /// 204 No Content (data is ignored)
    pub fn no_content() -> Self {
        Self::with_status((), StatusCode::NO_CONTENT)
    }
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        if self.status == StatusCode::NO_CONTENT {
            return self.status.into_response();
        }

        // Serialize up front so a failure still yields the error envelope
        match serde_json::to_value(&self.data) {
            Ok(value) => (self.status, Json(value)).into_response(),
            Err(e) => ApiError::Internal(anyhow::Error::new(e).context("failed to serialize response data"))
                .into_response(),
        }
    }
}

/// Callback outcome handed to the error normalizer.
pub type ApiResult<T> = Result<Reply<T>, ApiError>;
