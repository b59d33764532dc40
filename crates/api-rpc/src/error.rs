//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use infergate_core::domain::DomainError;
use infergate_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const WORKER_LIMIT: i32 = 4004;
    pub const INTERNAL_ERROR: i32 = 5000;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    match err {
        AppError::Validation(msg) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, msg, None::<()>)
        }
        AppError::NotFound(msg) => ErrorObjectOwned::owned(code::NOT_FOUND, msg, None::<()>),
        AppError::Conflict(msg) => ErrorObjectOwned::owned(code::CONFLICT, msg, None::<()>),
        AppError::InvalidState(msg) => ErrorObjectOwned::owned(code::CONFLICT, msg, None::<()>),
        AppError::Domain(e @ DomainError::DuplicateRequest(_)) => {
            ErrorObjectOwned::owned(code::CONFLICT, e.to_string(), None::<()>)
        }
        AppError::Domain(e) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, e.to_string(), None::<()>)
        }
        e @ AppError::WorkerLimit(_) => {
            ErrorObjectOwned::owned(code::WORKER_LIMIT, e.to_string(), None::<()>)
        }
        AppError::Provisioning(e) => {
            ErrorObjectOwned::owned(code::INTERNAL_ERROR, e.to_string(), None::<()>)
        }
        AppError::Internal(msg) => ErrorObjectOwned::owned(code::INTERNAL_ERROR, msg, None::<()>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            to_rpc_error(AppError::NotFound("q".into())).code(),
            code::NOT_FOUND
        );
        assert_eq!(
            to_rpc_error(AppError::InvalidState("busy".into())).code(),
            code::CONFLICT
        );
        assert_eq!(
            to_rpc_error(AppError::Domain(DomainError::DuplicateRequest("r".into()))).code(),
            code::CONFLICT
        );
        assert_eq!(
            to_rpc_error(AppError::Domain(DomainError::ValidationError("x".into()))).code(),
            code::VALIDATION_ERROR
        );
        assert_eq!(
            to_rpc_error(AppError::WorkerLimit(4)).code(),
            code::WORKER_LIMIT
        );
    }
}
