//! Error Kind - Classification of errors
//!
//! Defines the [`ErrorKind`] enum that maps to HTTP status codes.

use serde::Serialize;

/// Error classification shared by every crate in the workspace.
///
/// Each variant maps to one RFC 9110 status code so the outer HTTP layer
/// can translate a domain failure without knowing the domain.
///
/// ## Examples
/// ```rust
/// use kernel::error::kind::ErrorKind;
///
/// let kind = ErrorKind::PaymentRequired;
/// assert_eq!(kind.status_code(), 402);
/// assert_eq!(kind.as_str(), "Payment Required");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorKind {
    /// 400 - malformed or out-of-range input
    BadRequest,
    /// 401 - caller is not authenticated
    Unauthorized,
    /// 402 - wallet balance does not cover the operation
    PaymentRequired,
    /// 403 - caller does not own the resource
    Forbidden,
    /// 404 - resource does not exist
    NotFound,
    /// 408 - request timed out
    RequestTimeout,
    /// 409 - conflicts with current state, or lost a concurrent race
    Conflict,
    /// 410 - resource existed but is no longer usable
    Gone,
    /// 422 - well-formed but violates a business rule
    UnprocessableEntity,
    /// 429 - rate limit or throttle exceeded
    TooManyRequests,
    /// 500 - unexpected server fault
    InternalServerError,
    /// 503 - backing store unreachable or exhausted
    ServiceUnavailable,
}

impl ErrorKind {
    /// HTTP status code for this kind.
    ///
    /// ```rust
    /// use kernel::error::kind::ErrorKind;
    /// assert_eq!(ErrorKind::BadRequest.status_code(), 400);
    /// assert_eq!(ErrorKind::TooManyRequests.status_code(), 429);
    /// ```
    #[inline]
    pub const fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::PaymentRequired => 402,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::RequestTimeout => 408,
            ErrorKind::Conflict => 409,
            ErrorKind::Gone => 410,
            ErrorKind::UnprocessableEntity => 422,
            ErrorKind::TooManyRequests => 429,
            ErrorKind::InternalServerError => 500,
            ErrorKind::ServiceUnavailable => 503,
        }
    }

    /// Standard reason phrase.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "Bad Request",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::PaymentRequired => "Payment Required",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "Not Found",
            ErrorKind::RequestTimeout => "Request Timeout",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Gone => "Gone",
            ErrorKind::UnprocessableEntity => "Unprocessable Entity",
            ErrorKind::TooManyRequests => "Too Many Requests",
            ErrorKind::InternalServerError => "Internal Server Error",
            ErrorKind::ServiceUnavailable => "Service Unavailable",
        }
    }

    /// 5xx kinds. These are logged at error level.
    #[inline]
    pub const fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// 4xx kinds.
    #[inline]
    pub const fn is_client_error(&self) -> bool {
        let code = self.status_code();
        code >= 400 && code < 500
    }

    /// Whether the same request may succeed if simply retried later.
    #[inline]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Conflict
                | ErrorKind::TooManyRequests
                | ErrorKind::ServiceUnavailable
                | ErrorKind::RequestTimeout
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
