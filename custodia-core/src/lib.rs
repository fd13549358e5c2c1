pub mod identity;
pub mod policy;
pub mod store;

/// Error taxonomy for the whole engine. Every variant maps to a stable
/// machine-readable code; the HTTP layer maps codes to status codes.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid order transition from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    /// A terminal escrow was asked to move to a different terminal state.
    /// Non-retryable; indicates a bug or tampering.
    #[error("illegal escrow transition from {from} to {to}")]
    IllegalEscrowTransition { from: &'static str, to: &'static str },

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::Unauthorized(_) => "UNAUTHORIZED",
            CoreError::Forbidden(_) => "FORBIDDEN",
            CoreError::Validation(_) => "VALIDATION_FAILED",
            CoreError::InvalidTransition { .. } => "INVALID_TRANSITION",
            CoreError::IllegalEscrowTransition { .. } => "ILLEGAL_ESCROW_TRANSITION",
            CoreError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }

    /// Whether the caller may safely retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Conflict(_) | CoreError::StoreUnavailable(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
