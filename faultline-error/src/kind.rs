//! Business-level error kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The class of failure an error represents.
///
/// Kinds are a closed set of tags, not exception types. The discriminants are
/// part of the public contract: callers may persist them, so they never change.
/// `Other` is the unclassified sentinel and is never printed in messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Kind {
    /// Unclassified error. Not printed in the error message.
    #[default]
    Other = 0,

    /// Invalid operation, or the request failed validation
    Invalid = 1,

    /// Permission denied
    Permission = 2,

    /// External I/O error e.g. disk or network
    IO = 3,

    /// Item already exists
    Exist = 4,

    /// Item does not exist
    NotExist = 5,

    /// Timeout e.g. transient network error
    Timeout = 6,

    /// Database error e.g. deadlock
    Database = 7,

    /// Encoding error e.g. writing an HTTP response
    Encoding = 8,

    /// Decoding error e.g. decoding an HTTP request body
    Decoding = 9,

    /// HTTP error not related to network issues e.g. building a request
    HTTP = 10,

    /// Duplicate key reported by the database
    DuplicateKey = 11,

    /// The request was canceled
    Canceled = 12,

    /// The feature has not been implemented
    Unimplemented = 13,

    /// The syntax is not supported e.g. in a parser
    UnsupportedSyntax = 14,
}

impl Kind {
    /// Every kind, ordered by discriminant
    pub const ALL: [Kind; 15] = [
        Kind::Other,
        Kind::Invalid,
        Kind::Permission,
        Kind::IO,
        Kind::Exist,
        Kind::NotExist,
        Kind::Timeout,
        Kind::Database,
        Kind::Encoding,
        Kind::Decoding,
        Kind::HTTP,
        Kind::DuplicateKey,
        Kind::Canceled,
        Kind::Unimplemented,
        Kind::UnsupportedSyntax,
    ];

    /// Human-readable description used when rendering error messages
    pub fn description(&self) -> &'static str {
        match self {
            Kind::Other => "other error",
            Kind::Invalid => "invalid operation",
            Kind::Permission => "permission denied",
            Kind::IO => "I/O error",
            Kind::Exist => "item already exists",
            Kind::NotExist => "item does not exist",
            Kind::Timeout => "timeout error",
            Kind::Database => "database error",
            Kind::Encoding => "encoding error",
            Kind::Decoding => "decoding error",
            Kind::HTTP => "HTTP error",
            Kind::DuplicateKey => "duplicate key error",
            Kind::Canceled => "request canceled",
            Kind::Unimplemented => "unimplemented",
            Kind::UnsupportedSyntax => "unsupported syntax",
        }
    }

    /// Returns the variant name as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Other => "Other",
            Kind::Invalid => "Invalid",
            Kind::Permission => "Permission",
            Kind::IO => "IO",
            Kind::Exist => "Exist",
            Kind::NotExist => "NotExist",
            Kind::Timeout => "Timeout",
            Kind::Database => "Database",
            Kind::Encoding => "Encoding",
            Kind::Decoding => "Decoding",
            Kind::HTTP => "HTTP",
            Kind::DuplicateKey => "DuplicateKey",
            Kind::Canceled => "Canceled",
            Kind::Unimplemented => "Unimplemented",
            Kind::UnsupportedSyntax => "UnsupportedSyntax",
        }
    }

    /// Look up a kind by its persisted value
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Whether this kind carries a classification (anything but `Other`)
    pub fn is_classified(&self) -> bool {
        *self != Kind::Other
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl From<Kind> for u8 {
    fn from(kind: Kind) -> Self {
        kind as u8
    }
}

/// Returned when a persisted value or a name does not match any kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown error kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownKind {}

impl TryFrom<u8> for Kind {
    type Error = UnknownKind;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Kind::from_u8(value).ok_or_else(|| UnknownKind(value.to_string()))
    }
}

impl FromStr for Kind {
    type Err = UnknownKind;

    /// Parses a variant name, ignoring ASCII case and `_`/`-` separators
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect();
        Kind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_values_are_stable() {
        assert_eq!(Kind::Other as u8, 0);
        assert_eq!(Kind::NotExist as u8, 5);
        assert_eq!(Kind::Database as u8, 7);
        assert_eq!(Kind::UnsupportedSyntax as u8, 14);
        for (i, kind) in Kind::ALL.iter().enumerate() {
            assert_eq!(*kind as usize, i);
        }
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(Kind::NotExist.to_string(), "item does not exist");
        assert_eq!(Kind::Database.to_string(), "database error");
        assert_eq!(Kind::IO.to_string(), "I/O error");
        assert_eq!(Kind::UnsupportedSyntax.to_string(), "unsupported syntax");
    }

    #[test]
    fn test_from_u8() {
        assert_eq!(Kind::from_u8(3), Some(Kind::IO));
        assert_eq!(Kind::from_u8(15), None);
        assert_eq!(Kind::try_from(12u8), Ok(Kind::Canceled));
        assert!(Kind::try_from(200u8).is_err());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("notexist".parse::<Kind>(), Ok(Kind::NotExist));
        assert_eq!("duplicate-key".parse::<Kind>(), Ok(Kind::DuplicateKey));
        assert_eq!("IO".parse::<Kind>(), Ok(Kind::IO));
        assert!("bogus".parse::<Kind>().is_err());
    }

    #[test]
    fn test_serde_as_integer() {
        assert_eq!(serde_json::to_string(&Kind::Timeout).unwrap(), "6");
        let kind: Kind = serde_json::from_str("11").unwrap();
        assert_eq!(kind, Kind::DuplicateKey);
        assert!(serde_json::from_str::<Kind>("99").is_err());
    }
}
