pub(crate) const LOGIN_ENDPOINT: &str = "/auth/login/";
pub(crate) const REGISTER_ENDPOINT: &str = "/auth/register/";
pub(crate) const TOKEN_REFRESH_ENDPOINT: &str = "/auth/token/refresh/";
pub(crate) const PROFILE_ENDPOINT: &str = "/auth/profile/";
pub(crate) const USERS_ENDPOINT: &str = "/auth/users/";
pub(crate) const FOLLOW_ENDPOINT: &str = "/auth/follow/";
pub(crate) const UNFOLLOW_ENDPOINT: &str = "/auth/unfollow/";

/// Name of the durable storage key mirroring the refresh token.
pub(crate) const REFRESH_TOKEN_KEY: &str = "refreshToken";

pub(crate) const DEFAULT_HTTP_TIMEOUT: u64 = 10;

pub(crate) const NO_REFRESH_TOKEN_ERROR: &str = "No refresh token found";
