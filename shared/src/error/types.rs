//! AppError and the response envelope

use super::category::ErrorCategory;
use super::codes::ErrorCode;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

type Details = HashMap<String, Value>;

/// Error returned to API clients: a stable code, a message and optional
/// context such as the image or project id involved
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<Details>,
}

impl AppError {
    /// Error with the code's default message
    pub fn new(code: ErrorCode) -> Self {
        Self::with_message(code, code.message())
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(Details::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ValidationFailed, msg)
    }

    /// `field` outside `min..=max`
    pub fn out_of_range(field: &str, min: i64, max: i64) -> Self {
        Self::with_message(
            ErrorCode::ValueOutOfRange,
            format!("{field} must be between {min} and {max}"),
        )
        .with_detail("field", field)
    }

    pub fn image_not_found(image_id: &str) -> Self {
        Self::new(ErrorCode::ImageNotFound).with_detail("image_id", image_id)
    }

    pub fn project_not_found(project_id: &str) -> Self {
        Self::new(ErrorCode::ProjectNotFound).with_detail("project_id", project_id)
    }
}

/// Envelope for every JSON response.
///
/// `code` is 0 on success; on failure `data` is absent and `details`
/// carries the error context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Details>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: Some(ErrorCode::Success.code()),
            message: "OK".to_string(),
            data: Some(data),
            details: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(err: &AppError) -> Self {
        Self {
            code: Some(err.code.code()),
            message: err.message.clone(),
            data: None,
            details: err.details.clone(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        if self.code.category() == ErrorCategory::System {
            tracing::error!(code = %self.code, message = %self.message, "System error");
        }
        let body = ApiResponse::<()>::error(&self);
        (self.http_status(), axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_message() {
        let err = AppError::new(ErrorCode::ImageNotFound);
        assert_eq!(err.message, "Image not found");
        assert!(err.details.is_none());
        assert_eq!(err.to_string(), "Image not found");
    }

    #[test]
    fn test_details_accumulate() {
        let err = AppError::image_not_found("img-1").with_detail("relocation_state", "moving");
        let details = err.details.unwrap();
        assert_eq!(details["image_id"], "img-1");
        assert_eq!(details["relocation_state"], "moving");
    }

    #[test]
    fn test_out_of_range() {
        let err = AppError::out_of_range("rating", 0, 5);
        assert_eq!(err.code, ErrorCode::ValueOutOfRange);
        assert_eq!(err.message, "rating must be between 0 and 5");
        assert_eq!(err.http_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_envelope() {
        let response = ApiResponse::<()>::error(&AppError::project_not_found("p-1"));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["code"], 5001);
        assert_eq!(json["details"]["project_id"], "p-1");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_success_envelope() {
        let json = serde_json::to_value(ApiResponse::success("hello")).unwrap();
        assert_eq!(json["code"], 0);
        assert_eq!(json["data"], "hello");
        assert!(json.get("details").is_none());
    }
}
