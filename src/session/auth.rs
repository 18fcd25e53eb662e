//! Request and response models for the `/auth/` endpoints, plus the
//! classification of registration failures.

use crate::application::models::user::User;
use crate::error::{AuthError, RegisterError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub bio: String,
}

/// Body of a successful login or registration.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// The backend only includes `refresh` when it rotates the token.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// One entry of the backend's field-level validation errors.
#[derive(Debug, Deserialize)]
pub struct FieldError {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

const UNIQUE_CODE: &str = "unique";

/// Maps a 400 registration body onto a tagged failure. The backend reports
/// validation problems as `{field: [{code, message}, ...]}`; duplicates are
/// keyed off the `unique` code, never off message text.
pub(crate) fn classify_register_failure(body: &str) -> RegisterError {
    let fields: HashMap<String, Vec<FieldError>> = match serde_json::from_str(body) {
        Ok(fields) => fields,
        Err(_) => {
            return RegisterError::Other(AuthError::Other("registration failed".to_string()))
        }
    };

    if field_has_code(&fields, "username", UNIQUE_CODE) {
        RegisterError::DuplicateUsername
    } else if field_has_code(&fields, "email", UNIQUE_CODE) {
        RegisterError::DuplicateEmail
    } else if !fields.is_empty() {
        RegisterError::InvalidInput
    } else {
        RegisterError::Other(AuthError::Other("registration failed".to_string()))
    }
}

fn field_has_code(fields: &HashMap<String, Vec<FieldError>>, field: &str, code: &str) -> bool {
    fields
        .get(field)
        .is_some_and(|errors| errors.iter().any(|e| e.code == code))
}
