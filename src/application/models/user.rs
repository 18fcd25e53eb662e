use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile snapshot of a Gram user as served by `/auth/profile/` and the
/// user listing endpoints. Immutable value object; the session replaces it
/// wholesale on every profile fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub followers_count: u32,
    #[serde(default)]
    pub following_count: u32,
    #[serde(default)]
    pub is_following: bool,
    pub created_at: DateTime<Utc>,
}
