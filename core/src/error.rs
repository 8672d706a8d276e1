//! Error taxonomy and response classification.
//!
//! # Design
//! `Authentication`, `NotFound`, and `RateLimited` get dedicated variants
//! because callers branch on them: the operations layer converts `NotFound`
//! into absent-value results for reads, and `RateLimited` marks the escape
//! hatch of the 429 wait loop. Everything else lands in `Api` with the
//! server-supplied error type, message, and status code for debugging.
//!
//! `classify` never panics: when the error body is not the expected JSON
//! shape it degrades to the reason phrase and raw body text, and when those
//! are empty too it falls back to fixed placeholder strings.

use thiserror::Error;

use crate::http::HttpResponse;

const UNKNOWN_ERROR: &str = "Unknown Error";
const NO_MESSAGE: &str = "No error message provided";

/// Errors surfaced by `ConfigClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned 401 — the token is missing, invalid, or expired.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// The server returned 404 — the requested configuration does not exist.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// The server returned 429 and the rate-limit retry budget is spent.
    #[error("rate limited: {message}")]
    RateLimited { message: String },

    /// The request never produced a response (connection failure, timeout
    /// exhaustion after transport retries).
    #[error("network error: {message}")]
    Network { message: String },

    /// Any other API failure, with the server-supplied error type and the
    /// original status code where one was received.
    #[error("{error_type}: {message}")]
    Api {
        error_type: String,
        message: String,
        status: Option<u16>,
    },
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Map an error response to an `ApiError`.
///
/// The body is expected to be JSON with `error` and `message` fields; a
/// malformed body falls back to the reason phrase and raw text.
pub fn classify(response: &HttpResponse) -> ApiError {
    let (error_type, message) = match serde_json::from_str::<ErrorBody>(&response.body) {
        Ok(parsed) => (
            parsed.error.unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            parsed.message.unwrap_or_else(|| NO_MESSAGE.to_string()),
        ),
        Err(_) => (
            non_empty_or(&response.reason, UNKNOWN_ERROR),
            non_empty_or(&response.body, NO_MESSAGE),
        ),
    };

    match response.status {
        401 => ApiError::Authentication { message },
        404 => ApiError::NotFound { message },
        429 => ApiError::RateLimited { message },
        status => ApiError::Api {
            error_type,
            message,
            status: Some(status),
        },
    }
}

fn non_empty_or(s: &str, fallback: &str) -> String {
    if s.is_empty() {
        fallback.to_string()
    } else {
        s.to_string()
    }
}
