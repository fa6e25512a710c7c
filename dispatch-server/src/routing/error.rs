//! Routing provider errors.
//!
//! An unreachable destination is not an error; providers report it as a
//! missing duration.

use std::fmt;

#[derive(Debug)]
pub enum RoutingError {
    /// The request never got an answer (connect failure, timeout)
    Http(reqwest::Error),

    /// The answer was not a list of durations
    Json {
        message: String,
        /// Start of the offending body, if it could be read
        body: Option<String>,
    },

    /// Non-success status other than 429
    ApiError { status: u16, message: String },

    RateLimited,

    /// The answer does not line up with the destinations asked for
    LengthMismatch { expected: usize, got: usize },
}

impl RoutingError {
    /// Whether asking again later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RoutingError::RateLimited => true,
            RoutingError::Http(e) => e.is_timeout() || e.is_connect(),
            RoutingError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingError::Http(e) => write!(f, "routing request failed: {e}"),
            RoutingError::Json { message, body } => {
                write!(f, "unreadable routing response: {message}")?;
                match body {
                    Some(body) => write!(f, " (body: {body})"),
                    None => Ok(()),
                }
            }
            RoutingError::ApiError { status, message } => {
                write!(f, "routing server answered {status}: {message}")
            }
            RoutingError::RateLimited => write!(f, "rate limited by routing server"),
            RoutingError::LengthMismatch { expected, got } => {
                write!(f, "asked for {expected} durations, got {got}")
            }
        }
    }
}

impl std::error::Error for RoutingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RoutingError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RoutingError {
    fn from(err: reqwest::Error) -> Self {
        RoutingError::Http(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(RoutingError::RateLimited.to_string(), "rate limited by routing server");

        let err = RoutingError::ApiError {
            status: 502,
            message: "Bad Gateway".into(),
        };
        assert_eq!(err.to_string(), "routing server answered 502: Bad Gateway");

        let err = RoutingError::Json {
            message: "expected value".into(),
            body: Some("<html>".into()),
        };
        assert_eq!(
            err.to_string(),
            "unreadable routing response: expected value (body: <html>)"
        );

        let err = RoutingError::LengthMismatch { expected: 3, got: 2 };
        assert_eq!(err.to_string(), "asked for 3 durations, got 2");
    }

    #[test]
    fn server_errors_are_transient() {
        assert!(RoutingError::RateLimited.is_transient());
        let status = |status| RoutingError::ApiError {
            status,
            message: String::new(),
        };
        assert!(status(503).is_transient());
        assert!(!status(400).is_transient());
        assert!(!RoutingError::LengthMismatch { expected: 1, got: 0 }.is_transient());
    }
}
