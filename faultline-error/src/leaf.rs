//! Plain string errors and message predicates

use std::fmt;

/// A minimal error that is nothing more than its message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StrError {
    message: String,
}

impl StrError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StrError {}

/// Wrap a plain string into an error value
pub fn str_error(message: impl Into<String>) -> StrError {
    StrError::new(message)
}

/// Build a [`StrError`](crate::StrError) from a format string.
///
/// ```rust
/// let err = faultline_error::errorf!("user {} not found", 42);
/// assert_eq!(err.to_string(), "user 42 not found");
/// ```
#[macro_export]
macro_rules! errorf {
    ($($arg:tt)*) => {
        $crate::StrError::new(::std::format!($($arg)*))
    };
}

/// Message the database driver reports when a query matched nothing
const NO_ROWS: &str = "no rows in result set";

/// Reports whether an error's message says a query returned no rows.
///
/// This matches on the driver's message text rather than on a structured
/// classification, so it breaks if the driver rewords it. Prefer
/// classifying such errors with [`Kind::NotExist`](crate::Kind::NotExist)
/// where the query is issued.
pub fn is_no_rows(err: &(impl fmt::Display + ?Sized)) -> bool {
    err.to_string().contains(NO_ROWS)
}
