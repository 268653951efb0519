//! Error taxonomy for APEX.
//!
//! Every component boundary converts its lower-level failure into one of the
//! variants below. `thiserror` gives us `std::error::Error` plus `#[from]`
//! conversions from the driver crates we sit on top of.

use thiserror::Error;

/// The six expression-evaluation failure kinds a caller can branch on
/// (§4.1 "Reported kinds"). Every `ApexError::Expression` carries one of
/// these rather than free text, so CLI/library callers can classify a
/// failure without parsing its message.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionErrorKind {
    #[error("ParseError")]
    ParseError,
    #[error("UnknownIdentifier")]
    UnknownIdentifier,
    #[error("TypeMismatch")]
    TypeMismatch,
    #[error("NullDereference")]
    NullDereference,
    #[error("DivideByZero")]
    DivideByZero,
    #[error("UnsafeOperation")]
    UnsafeOperation,
}

/// The single error type returned across crate boundaries.
#[derive(Error, Debug)]
pub enum ApexError {
    /// Schema violations, unknown types, cycles, missing required fields.
    /// Fails fast at load time; never silently ignored.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Expression parse/evaluate failure. Surfaces as a rule or enrichment
    /// failure with source location; a rule that errors counts as
    /// non-triggered rather than crashing the chain.
    #[error("expression error ({kind}) at {span_start}..{span_end}: {message}")]
    Expression {
        kind: ExpressionErrorKind,
        message: String,
        span_start: usize,
        span_end: usize,
    },

    /// Missing lookup service, missing row, or a required field absent from
    /// the looked-up row.
    #[error("lookup error: {0}")]
    Lookup(String),

    /// Classified data-access failures (see `pool::classify`).
    #[error("data integrity violation: {0}")]
    DataIntegrityViolation(String),

    #[error("transient data access error: {0}")]
    Transient(String),

    #[error("data access configuration error: {0}")]
    DataAccessConfiguration(String),

    #[error("fatal data access error: {0}")]
    Fatal(String),

    /// Circuit breaker tripped; fails calls fast without attempting I/O.
    #[error("circuit open for {resource}")]
    CircuitOpen { resource: String },

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("operation cancelled")]
    Cancelled,

    /// Should never fire in production. If it does, the request fails with
    /// full context attached.
    #[error("internal invariant violated: {0}")]
    Internal(String),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),
}

impl ApexError {
    /// True when the error is in principle retryable by the caller (circuit,
    /// timeout, cancellation and transient data-access errors).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApexError::CircuitOpen { .. }
                | ApexError::Timeout(_)
                | ApexError::Cancelled
                | ApexError::Transient(_)
        )
    }

    /// The classified kind for an `Expression` error, for callers that want
    /// to branch without matching the whole variant.
    pub fn expression_kind(&self) -> Option<ExpressionErrorKind> {
        match self {
            ApexError::Expression { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        ApexError::Configuration(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        ApexError::Internal(msg.into())
    }
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, ApexError>;
