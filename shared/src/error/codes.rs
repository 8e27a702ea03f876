//! Error codes for the photo triage service
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Image lifecycle errors
//! - 5xxx: Project errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Represented as u16 on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 4xxx: Image ====================
    /// Image record not found
    ImageNotFound = 4001,
    /// Transition not allowed from the current status
    InvalidTransition = 4002,
    /// A relocation for this image is still pending or moving
    RelocationInFlight = 4003,
    /// The record changed between read and write
    ConcurrentModification = 4004,
    /// Color group is not a known label
    InvalidColorGroup = 4005,

    // ==================== 5xxx: Project ====================
    /// Project not found
    ProjectNotFound = 5001,
    /// Project is archived and accepts no new images
    ProjectArchived = 5002,
    /// Project name is empty
    ProjectNameRequired = 5003,

    // ==================== 9xxx: System ====================
    InternalError = 9001,
    DatabaseError = 9002,
    NetworkError = 9003,
    TimeoutError = 9004,
    ConfigError = 9005,
    /// Content store operation failed
    StorageError = 9401,
    /// Relocation queue is closed or full
    DispatchUnavailable = 9402,
}

impl ErrorCode {
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Image
            ErrorCode::ImageNotFound => "Image not found",
            ErrorCode::InvalidTransition => "Status transition not allowed",
            ErrorCode::RelocationInFlight => "A relocation is already in progress for this image",
            ErrorCode::ConcurrentModification => "Image was modified concurrently, reload and retry",
            ErrorCode::InvalidColorGroup => "Unknown color group",

            // Project
            ErrorCode::ProjectNotFound => "Project not found",
            ErrorCode::ProjectArchived => "Project is archived",
            ErrorCode::ProjectNameRequired => "Project name is required",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::StorageError => "Content store error",
            ErrorCode::DispatchUnavailable => "Relocation queue unavailable, please retry later",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Image
            4001 => Ok(ErrorCode::ImageNotFound),
            4002 => Ok(ErrorCode::InvalidTransition),
            4003 => Ok(ErrorCode::RelocationInFlight),
            4004 => Ok(ErrorCode::ConcurrentModification),
            4005 => Ok(ErrorCode::InvalidColorGroup),

            // Project
            5001 => Ok(ErrorCode::ProjectNotFound),
            5002 => Ok(ErrorCode::ProjectArchived),
            5003 => Ok(ErrorCode::ProjectNameRequired),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::NetworkError),
            9004 => Ok(ErrorCode::TimeoutError),
            9005 => Ok(ErrorCode::ConfigError),
            9401 => Ok(ErrorCode::StorageError),
            9402 => Ok(ErrorCode::DispatchUnavailable),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip_through_u16() {
        for code in [
            ErrorCode::Success,
            ErrorCode::ImageNotFound,
            ErrorCode::RelocationInFlight,
            ErrorCode::ProjectArchived,
            ErrorCode::DispatchUnavailable,
        ] {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }

    #[test]
    fn test_unknown_code_rejected() {
        assert_eq!(ErrorCode::try_from(4999), Err(InvalidErrorCode(4999)));
    }

    #[test]
    fn test_serde_as_number() {
        let json = serde_json::to_string(&ErrorCode::InvalidTransition).unwrap();
        assert_eq!(json, "4002");
        let code: ErrorCode = serde_json::from_str("5001").unwrap();
        assert_eq!(code, ErrorCode::ProjectNotFound);
    }
}
