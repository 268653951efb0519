//! SQL error classification (§4.4 "Error classification", §8 "Error
//! classification totality" invariant). The single source of truth for
//! retry-vs-fail decisions.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    DataIntegrityViolation,
    Transient,
    Configuration,
    Fatal,
}

impl ErrorClass {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClass::Transient)
    }
}

/// Classifies a SQLSTATE code plus message. Every input maps to exactly one
/// class — unknown codes fall through to `Fatal`, never an "unknown" leak.
pub fn classify_sqlstate(code: &str, message: &str) -> ErrorClass {
    match code {
        // Integrity constraint violation class.
        "23505" | "23503" | "23502" | "23514" => ErrorClass::DataIntegrityViolation,
        c if c.starts_with("23") => ErrorClass::DataIntegrityViolation,
        // Connection exception, deadlock, serialization failure.
        "40001" | "40P01" | "08000" | "08003" | "08006" | "08001" | "08004" => ErrorClass::Transient,
        c if c.starts_with("08") => ErrorClass::Transient,
        // Undefined table/column, syntax error.
        "42P01" | "42703" | "42601" => ErrorClass::Configuration,
        c if c.starts_with("42") => ErrorClass::Configuration,
        _ => classify_by_message(message),
    }
}

fn classify_by_message(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    if lower.contains("unique") || lower.contains("duplicate") || lower.contains("foreign key")
        || lower.contains("not null") || lower.contains("check constraint")
    {
        ErrorClass::DataIntegrityViolation
    } else if lower.contains("connection") || lower.contains("deadlock") || lower.contains("timeout")
        || lower.contains("serialization")
    {
        ErrorClass::Transient
    } else if lower.contains("syntax") || lower.contains("does not exist")
        || lower.contains("undefined")
    {
        ErrorClass::Configuration
    } else {
        ErrorClass::Fatal
    }
}

/// Classifies an [`sqlx::Error`] by inspecting the embedded database error
/// when present.
pub fn classify_sqlx_error(err: &sqlx::Error) -> ErrorClass {
    if let sqlx::Error::Database(db_err) = err {
        let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
        return classify_sqlstate(&code, db_err.message());
    }
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => ErrorClass::Transient,
        sqlx::Error::ColumnNotFound(_) | sqlx::Error::TypeNotFound { .. } => ErrorClass::Configuration,
        _ => ErrorClass::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_is_data_integrity() {
        assert_eq!(classify_sqlstate("23505", "duplicate key value"), ErrorClass::DataIntegrityViolation);
    }

    #[test]
    fn connection_loss_is_transient_and_retryable() {
        let class = classify_sqlstate("08006", "connection failure");
        assert_eq!(class, ErrorClass::Transient);
        assert!(class.is_retryable());
    }

    #[test]
    fn undefined_table_is_configuration_and_not_retryable() {
        let class = classify_sqlstate("42P01", "relation does not exist");
        assert_eq!(class, ErrorClass::Configuration);
        assert!(!class.is_retryable());
    }

    #[test]
    fn unknown_code_falls_back_to_message_classification_never_unknown() {
        let class = classify_sqlstate("99999", "something else entirely");
        assert_eq!(class, ErrorClass::Fatal);
    }
}
