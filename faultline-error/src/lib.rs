//! # faultline-error
//!
//! Structured errors that say what failed, how to classify it, and where it
//! came from.
//!
//! ## Design Philosophy
//!
//! - **Kind**: business-level class of the failure (e.g. NotExist, Timeout)
//! - **Code**: transport-level class, conventionally an HTTP status
//! - **Op**: the operation that was running
//! - **Stack**: captured where the error is built, rendered only when read
//!
//! ## Usage
//!
//! ```rust
//! use faultline_error::{e, Error, Kind, Op};
//!
//! fn find_user(id: u32) -> Result<(), Error> {
//!     Err(e!(Kind::NotExist, format!("user {}", id)).unwrap())
//! }
//!
//! fn load_profile(id: u32) -> Result<(), Error> {
//!     find_user(id).map_err(|err| e!(Op("profile.Load"), err).unwrap())
//! }
//!
//! let err = load_profile(42).unwrap_err();
//! assert_eq!(err.kind(), Kind::NotExist);
//! assert_eq!(err.to_string(), "item does not exist: profile.Load\nuser 42");
//! ```
//!
//! ## Principles
//!
//! - Wrapping a structured error moves its kind up to the new error and drops
//!   classification the new error already states
//! - Wrapping `None` gives `None`: absent errors pass through untouched
//! - Building an error never fails; unknown fragments degrade to a plain message
//! - Stack rendering never fails; unreadable sources degrade to function names

mod builder;
mod code;
mod error;
mod fragment;
mod kind;
mod leaf;
pub mod stack;

pub use builder::{build, build_with, ErrorBuilder};
pub use code::{Code, Op};
pub use error::{Cause, Error};
pub use fragment::Fragment;
pub use kind::{Kind, UnknownKind};
pub use leaf::{is_no_rows, str_error, StrError};
pub use stack::{Stack, StackConfig};

/// Result type alias using the structured Error
pub type Result<T> = std::result::Result<T, Error>;
