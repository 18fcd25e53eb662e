use reqwest::StatusCode;
use std::fmt::{self, Display, Formatter};
use std::io;

/// Failure to extract an expiry claim from a session token. Consumers treat
/// any of these as "expired" (fail-closed).
#[derive(Debug)]
pub enum DecodeError {
    Malformed,
    Base64(base64::DecodeError),
    Json(serde_json::Error),
    MissingExpiry,
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Malformed => write!(f, "token is not a three-part JWT"),
            DecodeError::Base64(e) => write!(f, "token payload is not valid base64: {e}"),
            DecodeError::Json(e) => write!(f, "token payload is not valid json: {e}"),
            DecodeError::MissingExpiry => write!(f, "token has no numeric exp claim"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<base64::DecodeError> for DecodeError {
    fn from(e: base64::DecodeError) -> Self {
        DecodeError::Base64(e)
    }
}
impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Json(e)
    }
}

/// Transport-level failure, normalized out of raw HTTP responses so callers
/// never branch on reqwest types directly.
#[derive(Debug)]
pub enum ApiError {
    Network(reqwest::Error),
    Json(serde_json::Error),
    Unauthorized,
    NotFound,
    Unexpected { status: StatusCode, body: String },
    Other(String),
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(e) => write!(f, "network error: {e}"),
            ApiError::Json(e) => write!(f, "json error: {e}"),
            ApiError::Unauthorized => write!(f, "unauthorized"),
            ApiError::NotFound => write!(f, "not found"),
            ApiError::Unexpected { status, body } => {
                write!(f, "unexpected http status {status}: {body}")
            }
            ApiError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Network(e)
    }
}
impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Json(e)
    }
}

/// Session-level failure surfaced by the session manager.
#[derive(Debug)]
pub enum AuthError {
    Network(reqwest::Error),
    Json(serde_json::Error),
    Storage(io::Error),
    BadCredentials,
    NoRefreshToken,
    Unexpected(StatusCode),
    Other(String),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Network(e) => write!(f, "network error: {e}"),
            AuthError::Json(e) => write!(f, "json error: {e}"),
            AuthError::Storage(e) => write!(f, "storage error: {e}"),
            AuthError::BadCredentials => write!(f, "bad credentials"),
            AuthError::NoRefreshToken => write!(f, "no refresh token available"),
            AuthError::Unexpected(s) => write!(f, "unexpected http status: {s}"),
            AuthError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::Network(e)
    }
}
impl From<io::Error> for AuthError {
    fn from(e: io::Error) -> Self {
        AuthError::Storage(e)
    }
}
impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        AuthError::Json(e)
    }
}

impl From<ApiError> for AuthError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Network(e) => AuthError::Network(e),
            ApiError::Json(e) => AuthError::Json(e),
            ApiError::Unauthorized => AuthError::BadCredentials,
            ApiError::NotFound => AuthError::Unexpected(StatusCode::NOT_FOUND),
            ApiError::Unexpected { status, .. } => AuthError::Unexpected(status),
            ApiError::Other(msg) => AuthError::Other(msg),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Network(e) => ApiError::Network(e),
            AuthError::Json(e) => ApiError::Json(e),
            AuthError::BadCredentials | AuthError::NoRefreshToken => ApiError::Unauthorized,
            AuthError::Storage(e) => ApiError::Other(format!("storage error: {e}")),
            AuthError::Unexpected(status) => ApiError::Unexpected {
                status,
                body: String::new(),
            },
            AuthError::Other(msg) => ApiError::Other(msg),
        }
    }
}

/// Registration failure, classified from the backend's structured
/// field-level error codes so callers can render a specific message.
#[derive(Debug)]
pub enum RegisterError {
    DuplicateUsername,
    DuplicateEmail,
    InvalidInput,
    Other(AuthError),
}

impl Display for RegisterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RegisterError::DuplicateUsername => write!(f, "username already exists"),
            RegisterError::DuplicateEmail => write!(f, "email already exists"),
            RegisterError::InvalidInput => write!(f, "invalid registration input"),
            RegisterError::Other(e) => write!(f, "registration failed: {e}"),
        }
    }
}

impl std::error::Error for RegisterError {}

impl From<AuthError> for RegisterError {
    fn from(e: AuthError) -> Self {
        RegisterError::Other(e)
    }
}
impl From<ApiError> for RegisterError {
    fn from(e: ApiError) -> Self {
        RegisterError::Other(e.into())
    }
}
