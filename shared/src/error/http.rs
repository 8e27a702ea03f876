//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            Self::NotFound | Self::ImageNotFound | Self::ProjectNotFound => StatusCode::NOT_FOUND,

            Self::AlreadyExists
            | Self::RelocationInFlight
            | Self::ConcurrentModification => StatusCode::CONFLICT,

            Self::InvalidTransition | Self::ProjectArchived => StatusCode::UNPROCESSABLE_ENTITY,

            // Transient, client can retry
            Self::NetworkError | Self::TimeoutError | Self::DispatchUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            Self::Unknown
            | Self::InternalError
            | Self::DatabaseError
            | Self::ConfigError
            | Self::StorageError => StatusCode::INTERNAL_SERVER_ERROR,

            // Validation and request shape errors
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_status() {
        assert_eq!(ErrorCode::ImageNotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::ProjectNotFound.http_status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_conflict_status() {
        assert_eq!(ErrorCode::RelocationInFlight.http_status(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::ConcurrentModification.http_status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_transition_and_validation_status() {
        assert_eq!(
            ErrorCode::InvalidTransition.http_status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ErrorCode::InvalidColorGroup.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::ValidationFailed.http_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_system_status() {
        assert_eq!(
            ErrorCode::StorageError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::DispatchUnavailable.http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
