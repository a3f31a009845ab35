use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - check RESAS_API_KEY")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

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

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        Self::from_code(status.as_u16(), body)
    }

    /// Classify a status code. RESAS also reports failures inside a 200
    /// body as `{"statusCode": "403", "message": ...}`, which lands here too.
    pub fn from_code(code: u16, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match code {
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", code, truncated)),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code_classification() {
        assert!(matches!(ApiError::from_code(401, ""), ApiError::Unauthorized));
        assert!(matches!(ApiError::from_code(403, "Forbidden."), ApiError::Forbidden(m) if m == "Forbidden."));
        assert!(matches!(ApiError::from_code(404, "x"), ApiError::NotFound(_)));
        assert!(ApiError::from_code(429, "").is_rate_limited());
        assert!(matches!(ApiError::from_code(503, "down"), ApiError::ServerError(_)));
        assert!(matches!(ApiError::from_code(400, "bad"), ApiError::InvalidResponse(m) if m.starts_with("Status 400")));
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "都".repeat(400);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.contains("truncated, 1200 total bytes"));

        assert_eq!(ApiError::truncate_body("short"), "short");
    }
}
