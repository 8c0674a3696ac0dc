//! The structured Error type

use crate::builder::ErrorBuilder;
use crate::stack::Stack;
use crate::{Code, Kind, Op, StrError};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use std::sync::Arc;

/// A classified error with a captured call stack.
///
/// Carries:
/// - `code`: transport-level classification, usually an HTTP status
/// - `op`: the operation that failed
/// - `kind`: business-level classification
/// - `wrapped`: the next error in the chain, never absent
/// - `stack`: where the error was built, rendered on first use
///
/// # Example
///
/// ```rust
/// use faultline_error::{e, Kind, Op};
///
/// let err = e!(Op("db.Insert"), Kind::Database, "connection refused").unwrap();
///
/// assert_eq!(err.kind(), Kind::Database);
/// assert_eq!(err.to_string(), "database error: db.Insert\nconnection refused");
/// ```
#[derive(Clone)]
pub struct Error {
    pub(crate) code: Code,
    pub(crate) op: Op,
    pub(crate) kind: Kind,
    pub(crate) wrapped: Cause,
    pub(crate) stack: Arc<Stack>,
}

/// What an [`Error`] wraps
#[derive(Clone)]
pub enum Cause {
    /// Any other error; the end of the structured chain
    Leaf(Arc<anyhow::Error>),
    /// Another structured error
    Structured(Box<Error>),
}

impl Cause {
    pub fn leaf(err: impl Into<anyhow::Error>) -> Self {
        Cause::Leaf(Arc::new(err.into()))
    }

    pub fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        match self {
            Cause::Leaf(err) => &***err,
            Cause::Structured(err) => &**err,
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Leaf(err) => write!(f, "{}", err),
            Cause::Structured(err) => write!(f, "{}", err),
        }
    }
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Leaf(err) => write!(f, "Leaf({:?})", err.to_string()),
            Cause::Structured(err) => write!(f, "Structured({:?})", err.to_string()),
        }
    }
}

impl Error {
    /// Start a fluent builder using the process-wide stack configuration
    pub fn builder() -> ErrorBuilder<'static> {
        ErrorBuilder::new()
    }

    /// An error that is only its message: no classification, no stack
    pub(crate) fn unstructured(leaf: StrError) -> Self {
        Self {
            code: Code::default(),
            op: Op::default(),
            kind: Kind::Other,
            wrapped: Cause::leaf(leaf),
            stack: Arc::new(Stack::empty()),
        }
    }

    // =========================================================================
    // Getters
    // =========================================================================

    /// Get the classification code
    pub fn code(&self) -> Code {
        self.code
    }

    /// Get the operation label
    pub fn op(&self) -> &Op {
        &self.op
    }

    /// Get the error kind
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Get the wrapped cause
    pub fn wrapped(&self) -> &Cause {
        &self.wrapped
    }

    /// The wrapped structured error, if this error wraps one
    pub fn inner(&self) -> Option<&Error> {
        match &self.wrapped {
            Cause::Structured(err) => Some(&**err),
            Cause::Leaf(_) => None,
        }
    }

    /// Get the call stack captured at construction
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// This error followed by every structured error it wraps
    pub fn chain(&self) -> impl Iterator<Item = &Error> {
        std::iter::successors(Some(self), |err| err.inner())
    }

    /// The message of the leaf at the end of the chain
    pub fn root_message(&self) -> String {
        self.chain()
            .last()
            .map(|err| err.wrapped.to_string())
            .unwrap_or_default()
    }

    // =========================================================================
    // Merge
    // =========================================================================

    /// Drop classification the wrapped error repeats.
    ///
    /// The inner code is cleared when equal to ours, the inner kind is reset
    /// when equal to ours, and if we have no kind the inner kind moves up here.
    /// The last step must follow the second so a duplicate is cleared rather
    /// than pulled up.
    pub(crate) fn merge(&mut self) {
        let Cause::Structured(inner) = &mut self.wrapped else {
            return;
        };

        if inner.code == self.code {
            inner.code = Code::default();
        }
        if inner.kind == self.kind {
            inner.kind = Kind::Other;
        }
        if self.kind == Kind::Other {
            self.kind = inner.kind;
            inner.kind = Kind::Other;
        }
    }

    // =========================================================================
    // JSON
    // =========================================================================

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

// =============================================================================
// Display - "code : kind: op\nwrapped"; `{:#}` appends the stack
// =============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();

        if self.code.is_set() {
            separate(&mut out, ": ");
            out.push_str("code ");
        }

        if self.kind.is_classified() {
            separate(&mut out, ": ");
            out.push_str(self.kind.description());
        }

        if !self.op.is_empty() {
            separate(&mut out, ": ");
            out.push_str(self.op.as_str());
        }

        separate(&mut out, "\n");
        out.push_str(&self.wrapped.to_string());

        if out.is_empty() {
            out.push_str("No error");
        }

        f.write_str(&out)?;
        if f.alternate() {
            f.write_str(&self.stack.to_text())?;
        }
        Ok(())
    }
}

fn separate(out: &mut String, separator: &str) {
    if !out.is_empty() {
        out.push_str(separator);
    }
}

// =============================================================================
// Debug - verbose, multi-line format for debugging
// =============================================================================

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (code {}) at {}", self.kind.as_str(), self.code, self.op)?;
        writeln!(f, "    Wrapped: {:?}", self.wrapped)?;

        let frames = self.stack.frames();
        if !frames.is_empty() {
            writeln!(f, "    Stack:")?;
            for frame in frames {
                writeln!(f, "        {}", frame)?;
            }
        }

        Ok(())
    }
}

// =============================================================================
// std::error::Error implementation
// =============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.wrapped.as_error())
    }
}

// =============================================================================
// Serialize - {"code","op","kind","err","stack"}
// =============================================================================

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Error", 5)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("op", &self.op)?;
        state.serialize_field("kind", &self.kind)?;
        state.serialize_field("err", &self.wrapped.to_string())?;
        state.serialize_field("stack", &*self.stack)?;
        state.end()
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;

        let kind = match err.kind() {
            Io::NotFound => Kind::NotExist,
            Io::PermissionDenied => Kind::Permission,
            Io::AlreadyExists => Kind::Exist,
            Io::TimedOut => Kind::Timeout,
            Io::InvalidInput | Io::InvalidData => Kind::Invalid,
            Io::Unsupported => Kind::Unimplemented,
            _ => Kind::IO,
        };
        ErrorBuilder::new().kind(kind).source(err).assemble()
    }
}

impl From<StrError> for Error {
    fn from(err: StrError) -> Self {
        ErrorBuilder::new().source(err).assemble()
    }
}
