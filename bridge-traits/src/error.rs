//! Error taxonomy shared by every layer that talks to the native bridge.
//!
//! Two shapes live here:
//!
//! - [`RawError`] is whatever the host hands to an error callback or throws
//!   from a synchronous call: a bare string, a partial JSON object, an
//!   exception message, or an error some other layer already normalized.
//! - [`BridgeError`] is the uniform `{code, message}` form callers see.
//!
//! Conversion from the former to the latter is the adapter's job
//! (`core_adapter::normalize`); this crate only defines the vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Category of a normalized failure.
///
/// Every category owns a reserved negative numeric code. Native bridges
/// report their own (usually non-negative) codes, which are preserved on
/// [`BridgeError::OperationFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The bridge object or the requested namespace is missing.
    EnvironmentUnavailable,
    /// Malformed or missing caller input.
    InvalidArgument,
    /// Lookup of a nonexistent id or listener.
    NotFound,
    /// Duplicate listener-identity registration.
    AlreadyExists,
    /// The bridge reported a failure.
    OperationFailed,
    /// Use of a handle after teardown.
    Destroyed,
    /// A deadline was lost.
    Timeout,
    /// Catch-all; always carries the original message.
    Unknown,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 8] = [
        ErrorCode::EnvironmentUnavailable,
        ErrorCode::InvalidArgument,
        ErrorCode::NotFound,
        ErrorCode::AlreadyExists,
        ErrorCode::OperationFailed,
        ErrorCode::Destroyed,
        ErrorCode::Timeout,
        ErrorCode::Unknown,
    ];

    /// Reserved numeric value for this category.
    pub const fn as_i64(self) -> i64 {
        match self {
            ErrorCode::EnvironmentUnavailable => -1001,
            ErrorCode::InvalidArgument => -1002,
            ErrorCode::NotFound => -1003,
            ErrorCode::AlreadyExists => -1004,
            ErrorCode::OperationFailed => -1005,
            ErrorCode::Destroyed => -1006,
            ErrorCode::Timeout => -1007,
            ErrorCode::Unknown => -1099,
        }
    }

    /// Maps a numeric code back to its category when it is one of the
    /// reserved values.
    pub fn from_i64(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_i64() == code)
    }

    /// Message used when a failure of this category arrives without one.
    pub const fn default_message(self) -> &'static str {
        match self {
            ErrorCode::EnvironmentUnavailable => "native bridge is not available",
            ErrorCode::InvalidArgument => "invalid argument",
            ErrorCode::NotFound => "not found",
            ErrorCode::AlreadyExists => "already exists",
            ErrorCode::OperationFailed => "native operation failed",
            ErrorCode::Destroyed => "handle destroyed",
            ErrorCode::Timeout => "operation timed out",
            ErrorCode::Unknown => "unknown error",
        }
    }
}

/// Normalized bridge failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Bridge operation failed ({code}): {message}")]
    OperationFailed { code: i64, message: String },

    #[error("Handle destroyed: {0}")]
    Destroyed(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl BridgeError {
    /// Builds an error from a numeric code and message.
    ///
    /// Reserved codes map back onto their own variant, so an error that went
    /// through a JSON round trip is reconstructed rather than re-wrapped. Any
    /// other code is a native code and becomes `OperationFailed`. An empty
    /// message is replaced with the category default.
    pub fn from_parts(code: i64, message: impl Into<String>) -> Self {
        let category = ErrorCode::from_i64(code);
        let mut message = message.into();
        if message.trim().is_empty() {
            message = category
                .unwrap_or(ErrorCode::OperationFailed)
                .default_message()
                .to_string();
        }

        match category {
            Some(ErrorCode::EnvironmentUnavailable) => BridgeError::EnvironmentUnavailable(message),
            Some(ErrorCode::InvalidArgument) => BridgeError::InvalidArgument(message),
            Some(ErrorCode::NotFound) => BridgeError::NotFound(message),
            Some(ErrorCode::AlreadyExists) => BridgeError::AlreadyExists(message),
            Some(ErrorCode::Destroyed) => BridgeError::Destroyed(message),
            Some(ErrorCode::Timeout) => BridgeError::Timeout(message),
            Some(ErrorCode::Unknown) => BridgeError::Unknown(message),
            Some(ErrorCode::OperationFailed) | None => {
                BridgeError::OperationFailed { code, message }
            }
        }
    }

    /// Category of this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            BridgeError::EnvironmentUnavailable(_) => ErrorCode::EnvironmentUnavailable,
            BridgeError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            BridgeError::NotFound(_) => ErrorCode::NotFound,
            BridgeError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            BridgeError::OperationFailed { .. } => ErrorCode::OperationFailed,
            BridgeError::Destroyed(_) => ErrorCode::Destroyed,
            BridgeError::Timeout(_) => ErrorCode::Timeout,
            BridgeError::Unknown(_) => ErrorCode::Unknown,
        }
    }

    /// Numeric code: the native code for `OperationFailed`, the reserved
    /// code otherwise.
    pub fn code(&self) -> i64 {
        match self {
            BridgeError::OperationFailed { code, .. } => *code,
            other => other.error_code().as_i64(),
        }
    }

    /// The human-readable message, without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            BridgeError::EnvironmentUnavailable(message)
            | BridgeError::InvalidArgument(message)
            | BridgeError::NotFound(message)
            | BridgeError::AlreadyExists(message)
            | BridgeError::Destroyed(message)
            | BridgeError::Timeout(message)
            | BridgeError::Unknown(message) => message,
            BridgeError::OperationFailed { message, .. } => message,
        }
    }

    /// `{code, message}` object as handed back across the bridge boundary.
    pub fn to_json(&self) -> Value {
        json!({ "code": self.code(), "message": self.message() })
    }

    pub fn environment_unavailable(what: impl std::fmt::Display) -> Self {
        BridgeError::EnvironmentUnavailable(format!("{what} is not available in this host"))
    }

    pub fn destroyed(what: impl std::fmt::Display) -> Self {
        BridgeError::Destroyed(format!("{what} has been destroyed"))
    }
}

/// A failure exactly as the host produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum RawError {
    /// A bare string passed to the error callback.
    Message(String),
    /// An arbitrary JSON value, usually a partial `{code, message}` object.
    Json(Value),
    /// A synchronous exception that only carries a message.
    Thrown(String),
    /// An error another layer already normalized.
    Normalized(BridgeError),
}

impl From<BridgeError> for RawError {
    fn from(error: BridgeError) -> Self {
        RawError::Normalized(error)
    }
}

impl From<String> for RawError {
    fn from(message: String) -> Self {
        RawError::Message(message)
    }
}

impl From<&str> for RawError {
    fn from(message: &str) -> Self {
        RawError::Message(message.to_string())
    }
}

impl From<Value> for RawError {
    fn from(value: Value) -> Self {
        RawError::Json(value)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
