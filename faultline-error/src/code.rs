//! Transport-level codes and operation labels

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// An opaque classification code, conventionally an HTTP status.
///
/// Zero means "unset". Any integer is accepted; the named constants are the
/// ones this library gives meaning to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Code(pub i32);

impl Code {
    /// Request was malformed
    pub const BAD_REQUEST: Code = Code(400);
    /// Unspecified server error
    pub const SERVER_ERROR: Code = Code(500);
    /// A business logic related error
    pub const INVALID: Code = Code(422);
    /// The user has not been authenticated
    pub const UNAUTHORIZED: Code = Code(401);
    /// The user is not authorized
    pub const FORBIDDEN: Code = Code(403);
    /// The resource was not found
    pub const NOT_FOUND: Code = Code(404);

    /// The named codes with their labels, in declaration order
    pub const NAMED: [(&'static str, Code); 6] = [
        ("bad-request", Code::BAD_REQUEST),
        ("server-error", Code::SERVER_ERROR),
        ("invalid", Code::INVALID),
        ("unauthorized", Code::UNAUTHORIZED),
        ("forbidden", Code::FORBIDDEN),
        ("not-found", Code::NOT_FOUND),
    ];

    pub fn value(&self) -> i32 {
        self.0
    }

    /// Whether a code has been assigned
    pub fn is_set(&self) -> bool {
        self.0 != 0
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.0)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Code {
    fn from(value: i32) -> Self {
        Code(value)
    }
}

/// Name of the operation that was running when the error occurred,
/// e.g. `"db.Insert"`. Empty means unset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Op {
    name: Cow<'static, str>,
}

impl Op {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Op { name: name.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&'static str> for Op {
    fn from(name: &'static str) -> Self {
        Op::new(Cow::Borrowed(name))
    }
}

impl From<String> for Op {
    fn from(name: String) -> Self {
        Op::new(Cow::Owned(name))
    }
}

/// Shorthand constructor so call sites read `Op("db.Insert")`
#[allow(non_snake_case)]
pub fn Op(name: impl Into<Cow<'static, str>>) -> Op {
    Op::new(name)
}
