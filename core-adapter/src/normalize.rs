//! Conversion of arbitrarily-shaped native failures into [`BridgeError`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use bridge_traits::{BridgeError, ErrorCode, RawError};
use serde_json::Value;

/// Normalizes a raw native failure.
///
/// - An already-normalized error is returned unchanged.
/// - A JSON object contributes its `code` (integer, integral float or
///   numeric string) and `message`; missing parts come from the fallbacks.
///   A reserved code reconstructs the matching taxonomy variant.
/// - A bare string becomes the message under `fallback_code`.
/// - A bare integer becomes the code under `fallback_message`.
/// - A thrown exception becomes [`BridgeError::Unknown`] carrying its
///   original message.
///
/// The result always has a non-empty message.
pub fn normalize(raw: RawError, fallback_code: i64, fallback_message: &str) -> BridgeError {
    match raw {
        RawError::Normalized(error) => error,
        RawError::Thrown(message) => BridgeError::Unknown(non_empty(message, fallback_message)),
        RawError::Message(message) => {
            BridgeError::from_parts(fallback_code, non_empty(message, fallback_message))
        }
        RawError::Json(value) => from_json(value, fallback_code, fallback_message),
    }
}

/// [`normalize`] with the generic `OperationFailed` fallbacks.
pub fn normalize_default(raw: RawError) -> BridgeError {
    normalize(
        raw,
        ErrorCode::OperationFailed.as_i64(),
        ErrorCode::OperationFailed.default_message(),
    )
}

fn from_json(value: Value, fallback_code: i64, fallback_message: &str) -> BridgeError {
    match value {
        Value::Object(map) => {
            let code = map
                .get("code")
                .and_then(code_from_value)
                .unwrap_or(fallback_code);
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default();
            BridgeError::from_parts(code, non_empty(message, fallback_message))
        }
        Value::String(message) => {
            BridgeError::from_parts(fallback_code, non_empty(message, fallback_message))
        }
        Value::Number(_) => {
            let code = code_from_value(&value).unwrap_or(fallback_code);
            BridgeError::from_parts(code, fallback_message)
        }
        Value::Null => BridgeError::from_parts(fallback_code, fallback_message),
        other => BridgeError::from_parts(fallback_code, other.to_string()),
    }
}

fn code_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn non_empty(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

/// Runs a synchronous native operation, normalizing both its error return
/// and a panic.
pub(crate) fn guarded<R, F>(fallback_message: &str, operation: F) -> Result<R, BridgeError>
where
    F: FnOnce() -> Result<R, RawError>,
{
    match panic::catch_unwind(AssertUnwindSafe(operation)) {
        Ok(outcome) => outcome.map_err(|raw| {
            normalize(raw, ErrorCode::OperationFailed.as_i64(), fallback_message)
        }),
        Err(payload) => Err(BridgeError::Unknown(panic_message(payload.as_ref()))),
    }
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "native call panicked".to_string()
    }
}
