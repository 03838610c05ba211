//! Shared error conventions.

/// Grepable error code and retryable flag for structured error reporting.
///
/// Every module-level error enum implements this so callers (and logs) can
/// branch on a stable code instead of matching display strings.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
