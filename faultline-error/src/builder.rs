//! Assembling errors from fragments

use crate::error::{Cause, Error};
use crate::stack::{Stack, StackConfig};
use crate::{Code, Fragment, Kind, Op, StrError};
use std::sync::Arc;

/// Build an error from fragments using the process-wide stack configuration.
///
/// Returns `None` if any fragment is [`Fragment::Nil`], so a possibly absent
/// error can be wrapped without checking it first.
///
/// # Panics
///
/// Panics if `fragments` is empty. Calling with nothing to report is a
/// programming error, not a runtime condition.
pub fn build<I, F>(fragments: I) -> Option<Error>
where
    I: IntoIterator<Item = F>,
    F: Into<Fragment>,
{
    build_with(StackConfig::global(), fragments)
}

/// Like [`build`], capturing the stack with `config`
pub fn build_with<I, F>(config: &StackConfig, fragments: I) -> Option<Error>
where
    I: IntoIterator<Item = F>,
    F: Into<Fragment>,
{
    let mut builder = ErrorBuilder::with_config(config);
    let mut count = 0usize;
    for fragment in fragments {
        builder = builder.fragment(fragment);
        count += 1;
    }
    assert!(count > 0, "no fragments provided to faultline_error::build");
    builder.finish()
}

/// Build an error from any mix of fragments.
///
/// ```rust
/// use faultline_error::{e, Code, Kind, Op};
///
/// let inner = e!(Code::NOT_FOUND, Kind::NotExist, "user 42").unwrap();
/// let outer = e!(Op("user.Load"), inner).unwrap();
/// assert_eq!(outer.kind(), Kind::NotExist);
///
/// let nothing: Option<faultline_error::Error> = None;
/// assert!(e!(Op("user.Load"), nothing).is_none());
/// ```
#[macro_export]
macro_rules! e {
    () => {
        ::std::compile_error!("e! needs at least one fragment")
    };
    ($($fragment:expr),+ $(,)?) => {
        $crate::build([$($crate::Fragment::from($fragment)),+])
    };
}

/// Why the builder stopped taking fragments
enum Halt {
    Nil,
    Unknown { type_name: &'static str, value: String },
}

/// Fluent construction of an [`Error`].
///
/// Each setter is the typed form of one [`Fragment`]; the same rules apply.
///
/// ```rust
/// use faultline_error::{Code, Error, Kind};
///
/// let err = Error::builder()
///     .code(Code::BAD_REQUEST)
///     .op("order.Parse")
///     .kind(Kind::Decoding)
///     .message("unexpected end of input")
///     .finish()
///     .unwrap();
///
/// assert_eq!(err.to_string(), "code : decoding error: order.Parse\nunexpected end of input");
/// ```
pub struct ErrorBuilder<'a> {
    config: &'a StackConfig,
    code: Code,
    op: Op,
    kind: Kind,
    wrapped: Option<Cause>,
    halt: Option<Halt>,
}

impl ErrorBuilder<'static> {
    pub fn new() -> Self {
        Self::with_config(StackConfig::global())
    }
}

impl Default for ErrorBuilder<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ErrorBuilder<'a> {
    pub fn with_config(config: &'a StackConfig) -> Self {
        Self {
            config,
            code: Code::default(),
            op: Op::default(),
            kind: Kind::Other,
            wrapped: None,
            halt: None,
        }
    }

    pub fn code(mut self, code: impl Into<Code>) -> Self {
        self.code = code.into();
        self
    }

    pub fn op(mut self, op: impl Into<Op>) -> Self {
        self.op = op.into();
        self
    }

    pub fn kind(mut self, kind: Kind) -> Self {
        self.kind = kind;
        self
    }

    /// Use a plain message as the leaf error
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.wrapped = Some(Cause::leaf(StrError::new(message)));
        self
    }

    /// Wrap an arbitrary error as the leaf
    pub fn source<E>(mut self, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.wrapped = Some(Cause::leaf(err));
        self
    }

    /// Wrap another structured error. Its classification is merged on finish.
    pub fn wrap(mut self, err: Error) -> Self {
        self.wrapped = Some(Cause::Structured(Box::new(err)));
        self
    }

    /// Apply one fragment. After a nil or unknown fragment the rest are ignored.
    pub fn fragment(mut self, fragment: impl Into<Fragment>) -> Self {
        if self.halt.is_some() {
            return self;
        }

        match fragment.into() {
            Fragment::Code(code) => self.code = code,
            Fragment::Op(op) => self.op = op,
            Fragment::Kind(kind) => self.kind = kind,
            Fragment::Message(message) => return self.message(message),
            Fragment::Source(err) => self.wrapped = Some(Cause::leaf(err)),
            Fragment::Wrapped(err) => return self.wrap(err),
            Fragment::Nil => self.halt = Some(Halt::Nil),
            Fragment::Unknown { type_name, value } => {
                self.halt = Some(Halt::Unknown { type_name, value })
            }
        }
        self
    }

    /// Produce the error, or `None` if a nil fragment was seen.
    ///
    /// An unknown fragment yields an unclassified error whose message names
    /// the offending value, so the caller's error path still gets an error.
    pub fn finish(self) -> Option<Error> {
        match self.halt {
            Some(Halt::Nil) => None,
            Some(Halt::Unknown { type_name, value }) => {
                tracing::warn!(type_name, value = %value, "unknown fragment in error call");
                Some(Error::unstructured(StrError::new(format!(
                    "unknown type {}, value {} in error call",
                    type_name, value
                ))))
            }
            None => Some(self.assemble()),
        }
    }

    /// Build the error ignoring any halt; captures the stack here.
    pub(crate) fn assemble(self) -> Error {
        let wrapped = self
            .wrapped
            .unwrap_or_else(|| Cause::leaf(StrError::default()));

        let mut error = Error {
            code: self.code,
            op: self.op,
            kind: self.kind,
            wrapped,
            stack: Arc::new(Stack::capture(self.config)),
        };
        error.merge();
        error
    }
}
