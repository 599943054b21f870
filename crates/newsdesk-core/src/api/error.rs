use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The identity service answered and refused the request with a message
    #[error("{0}")]
    Rejected(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error envelope used by the content API: `{"error": "..."}`, sometimes `{"message": "..."}`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorField>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Text(String),
    Detailed { message: Option<String> },
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Pull a human readable message out of an error body, if it carries one
    pub fn message_from_body(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        let from_error = match parsed.error {
            Some(ErrorField::Text(text)) => Some(text),
            Some(ErrorField::Detailed { message }) => message,
            None => None,
        };
        from_error
            .or(parsed.message)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .map(|m| Self::truncate_body(&m))
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Like `from_status`, but a message in the body wins: the server rejected
    /// the request and said why.
    pub fn from_rejection(status: reqwest::StatusCode, body: &str) -> Self {
        if status.is_client_error() {
            if let Some(message) = Self::message_from_body(body) {
                return ApiError::Rejected(message);
            }
        }
        Self::from_status(status, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(ApiError::from_status(StatusCode::UNAUTHORIZED, ""), ApiError::Unauthorized));
        assert!(matches!(ApiError::from_status(StatusCode::FORBIDDEN, "no"), ApiError::AccessDenied(_)));
        assert!(matches!(ApiError::from_status(StatusCode::NOT_FOUND, ""), ApiError::NotFound(_)));
        assert!(matches!(ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""), ApiError::RateLimited));
        assert!(matches!(ApiError::from_status(StatusCode::BAD_GATEWAY, ""), ApiError::ServerError(_)));
        assert!(matches!(ApiError::from_status(StatusCode::IM_A_TEAPOT, ""), ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_message_from_body_variants() {
        assert_eq!(
            ApiError::message_from_body(r#"{"error":"Invalid credentials"}"#).as_deref(),
            Some("Invalid credentials")
        );
        assert_eq!(
            ApiError::message_from_body(r#"{"message":"Account locked"}"#).as_deref(),
            Some("Account locked")
        );
        assert_eq!(
            ApiError::message_from_body(r#"{"error":{"message":"Too many attempts"}}"#).as_deref(),
            Some("Too many attempts")
        );
        assert_eq!(ApiError::message_from_body(r#"{"error":"  "}"#), None);
        assert_eq!(ApiError::message_from_body("<html>oops</html>"), None);
    }

    #[test]
    fn test_from_rejection_prefers_body_message() {
        let err = ApiError::from_rejection(StatusCode::UNAUTHORIZED, r#"{"error":"Wrong password"}"#);
        assert_eq!(err.to_string(), "Wrong password");

        let err = ApiError::from_rejection(StatusCode::UNAUTHORIZED, "");
        assert!(matches!(err, ApiError::Unauthorized));

        // Server errors are never treated as a rejection, even with a message
        let err = ApiError::from_rejection(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error":"db down"}"#);
        assert!(matches!(err, ApiError::ServerError(_)));
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.contains("truncated, 520 total bytes"));

        // Multi-byte characters straddling the limit must not panic
        let wide = "é".repeat(MAX_ERROR_BODY_LENGTH);
        assert!(ApiError::truncate_body(&wide).contains("truncated"));
    }
}
