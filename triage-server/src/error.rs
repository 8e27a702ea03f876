//! Unified service-layer error type for the triage server
//!
//! `ServiceError` bridges store-layer errors (`DbError`, `StoreError`,
//! `DispatchError`) and business-rule errors to the API-layer `AppError`,
//! so handlers can use `?` without mapping every call by hand.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};

use crate::db::DbError;
use crate::dispatch::DispatchError;
use crate::lifecycle::TransitionError;
use crate::store::StoreError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug)]
pub enum ServiceError {
    /// Infrastructure failure (logged on conversion, details not exposed)
    Infra { code: ErrorCode, source: BoxError },
    /// Business-rule error, passed through to the client
    App(AppError),
}

impl ServiceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::Infra { code, .. } => *code,
            ServiceError::App(e) => e.code,
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Conflict { id } => ServiceError::App(
                AppError::new(ErrorCode::ConcurrentModification).with_detail("id", id),
            ),
            DbError::Duplicate { id } => {
                ServiceError::App(AppError::new(ErrorCode::AlreadyExists).with_detail("id", id))
            }
            other => ServiceError::Infra {
                code: ErrorCode::DatabaseError,
                source: other.into(),
            },
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        ServiceError::Infra {
            code: ErrorCode::StorageError,
            source: e.into(),
        }
    }
}

impl From<DispatchError> for ServiceError {
    fn from(e: DispatchError) -> Self {
        ServiceError::Infra {
            code: ErrorCode::DispatchUnavailable,
            source: e.into(),
        }
    }
}

impl From<TransitionError> for ServiceError {
    fn from(e: TransitionError) -> Self {
        let code = match &e {
            TransitionError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            TransitionError::InvalidColorGroup(_) => ErrorCode::InvalidColorGroup,
            TransitionError::ProjectArchived(_) => ErrorCode::ProjectArchived,
            TransitionError::ProjectMismatch(_) => ErrorCode::ProjectNotFound,
        };
        ServiceError::App(AppError::with_message(code, e.to_string()))
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Infra { code, source } => {
                tracing::error!(code = %code, error = %source, "Service infrastructure error");
                AppError::new(code)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

/// Convenience type alias for service-layer results
pub type ServiceResult<T> = Result<T, ServiceError>;
