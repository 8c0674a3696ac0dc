//! Typed pieces an error is assembled from

use crate::{Code, Error, Kind, Op, StrError};
use std::any::{self, Any};
use std::fmt;

/// One argument to [`build`](crate::build) or [`e!`](crate::e).
///
/// Fragments may be given in any order. Later fragments of the same
/// category replace earlier ones.
pub enum Fragment {
    /// Sets the classification code
    Code(Code),
    /// Sets the operation label
    Op(Op),
    /// Sets the kind
    Kind(Kind),
    /// A plain message; becomes the leaf error
    Message(String),
    /// An arbitrary error; wrapped as the leaf
    Source(anyhow::Error),
    /// A structured error; wrapped and merged with the new one
    Wrapped(Error),
    /// Nothing to report. Building with this fragment yields no error.
    Nil,
    /// A value of a type the builder does not understand
    Unknown { type_name: &'static str, value: String },
}

impl Fragment {
    /// Wrap any error as the leaf
    pub fn source<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Fragment::Source(anyhow::Error::new(err))
    }

    /// Classify a dynamically typed value.
    ///
    /// Recognized types map to their fragment and `()` maps to
    /// [`Fragment::Nil`]. Anything else becomes [`Fragment::Unknown`], which
    /// makes the builder return a plain error describing the value.
    pub fn any<T: Any + fmt::Debug>(value: &T) -> Self {
        let dynamic = value as &dyn Any;
        if let Some(code) = dynamic.downcast_ref::<Code>() {
            Fragment::Code(*code)
        } else if let Some(kind) = dynamic.downcast_ref::<Kind>() {
            Fragment::Kind(*kind)
        } else if let Some(op) = dynamic.downcast_ref::<Op>() {
            Fragment::Op(op.clone())
        } else if let Some(message) = dynamic.downcast_ref::<String>() {
            Fragment::Message(message.clone())
        } else if let Some(message) = dynamic.downcast_ref::<&str>() {
            Fragment::Message(message.to_string())
        } else if let Some(err) = dynamic.downcast_ref::<Error>() {
            Fragment::Wrapped(err.clone())
        } else if let Some(err) = dynamic.downcast_ref::<Option<Error>>() {
            err.as_ref().map_or(Fragment::Nil, |err| Fragment::Wrapped(err.clone()))
        } else if let Some(err) = dynamic.downcast_ref::<StrError>() {
            Fragment::source(err.clone())
        } else if dynamic.is::<()>() {
            Fragment::Nil
        } else {
            Fragment::Unknown {
                type_name: any::type_name::<T>(),
                value: format!("{:?}", value),
            }
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Fragment::Nil)
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fragment::Code(code) => write!(f, "Code({})", code),
            Fragment::Op(op) => write!(f, "Op({:?})", op.as_str()),
            Fragment::Kind(kind) => write!(f, "Kind({})", kind.as_str()),
            Fragment::Message(message) => write!(f, "Message({:?})", message),
            Fragment::Source(err) => write!(f, "Source({:?})", err.to_string()),
            Fragment::Wrapped(err) => write!(f, "Wrapped({:?})", err.to_string()),
            Fragment::Nil => f.write_str("Nil"),
            Fragment::Unknown { type_name, value } => {
                write!(f, "Unknown({}: {})", type_name, value)
            }
        }
    }
}

impl From<Code> for Fragment {
    fn from(code: Code) -> Self {
        Fragment::Code(code)
    }
}

impl From<Op> for Fragment {
    fn from(op: Op) -> Self {
        Fragment::Op(op)
    }
}

impl From<Kind> for Fragment {
    fn from(kind: Kind) -> Self {
        Fragment::Kind(kind)
    }
}

impl From<&str> for Fragment {
    fn from(message: &str) -> Self {
        Fragment::Message(message.to_string())
    }
}

impl From<String> for Fragment {
    fn from(message: String) -> Self {
        Fragment::Message(message)
    }
}

impl From<Error> for Fragment {
    fn from(err: Error) -> Self {
        Fragment::Wrapped(err)
    }
}

/// Wrapping a borrowed error takes a copy; the caller's value is never
/// touched by the merge.
impl From<&Error> for Fragment {
    fn from(err: &Error) -> Self {
        Fragment::Wrapped(err.clone())
    }
}

impl From<StrError> for Fragment {
    fn from(err: StrError) -> Self {
        Fragment::source(err)
    }
}

impl From<std::io::Error> for Fragment {
    fn from(err: std::io::Error) -> Self {
        Fragment::source(err)
    }
}

impl From<anyhow::Error> for Fragment {
    fn from(err: anyhow::Error) -> Self {
        Fragment::Source(err)
    }
}

/// `None` is an explicit "no error": the whole build yields nothing.
impl<T: Into<Fragment>> From<Option<T>> for Fragment {
    fn from(value: Option<T>) -> Self {
        value.map_or(Fragment::Nil, Into::into)
    }
}
