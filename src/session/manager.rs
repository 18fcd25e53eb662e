use crate::application::models::user::User;
use crate::config::Config;
use crate::constants::{
    LOGIN_ENDPOINT, NO_REFRESH_TOKEN_ERROR, PROFILE_ENDPOINT, REGISTER_ENDPOINT,
    TOKEN_REFRESH_ENDPOINT,
};
use crate::error::{ApiError, AuthError, RegisterError};
use crate::session::auth::{
    classify_register_failure, AuthResponse, LoginRequest, RefreshRequest, RefreshResponse,
    RegisterRequest,
};
use crate::session::token;
use crate::storage::TokenStore;
use crate::transport::http_client::HttpClient;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::fmt::Debug;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated,
    Refreshing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticating => "authenticating",
            SessionState::Authenticated => "authenticated",
            SessionState::Refreshing => "refreshing",
        };
        write!(f, "{name}")
    }
}

/// Snapshot of the process-wide session. `is_authenticated` is true only if
/// an access token was present and unexpired at the moment it was last set,
/// and `refresh_token` always equals the durably persisted copy once a
/// manager operation has completed.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub is_authenticated: bool,
    pub current_user: Option<User>,
    pub is_loading: bool,
    pub last_error: Option<String>,
    pub state: SessionState,
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{\"state\":\"{}\",\"is_authenticated\":{},\"is_loading\":{},\"access_token\":{},\"refresh_token\":{},\"user\":{},\"last_error\":{}}}",
            self.state,
            self.is_authenticated,
            self.is_loading,
            self.access_token
                .as_ref()
                .map_or("null".to_string(), |_| "\"[REDACTED]\"".to_string()),
            self.refresh_token
                .as_ref()
                .map_or("null".to_string(), |_| "\"[REDACTED]\"".to_string()),
            self.current_user
                .as_ref()
                .map_or("null".to_string(), |u| format!("\"{}\"", u.username)),
            self.last_error
                .as_ref()
                .map_or("null".to_string(), |e| format!("\"{e}\"")),
        )
    }
}

/// Owns the session state machine: login, registration, logout, silent
/// refresh and the startup bootstrap. All token mutations and the durable
/// write-through of the refresh token go through here.
pub struct SessionManager {
    http: HttpClient,
    store: Arc<dyn TokenStore>,
    session: RwLock<Session>,
    // Single-flight gate: concurrent refresh callers queue here and adopt
    // the token produced by whoever got in first.
    refresh_gate: tokio::sync::Mutex<()>,
}

impl SessionManager {
    pub fn new(config: &Config, store: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let http = HttpClient::from_config(config)?;
        Ok(Self {
            http,
            store,
            session: RwLock::new(Session::default()),
            refresh_gate: tokio::sync::Mutex::new(()),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Clone of the current session snapshot.
    pub fn session(&self) -> Session {
        self.read().clone()
    }

    pub fn state(&self) -> SessionState {
        self.read().state
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.read().current_user.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.read().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.write().last_error = None;
    }

    pub(crate) fn set_current_user(&self, user: User) {
        self.write().current_user = Some(user);
    }

    #[cfg(test)]
    pub(crate) fn set_session(&self, session: Session) {
        *self.write() = session;
    }

    pub(crate) fn increment_following(&self) {
        if let Some(user) = &mut self.write().current_user {
            user.following_count = user.following_count.saturating_add(1);
        }
    }

    pub(crate) fn decrement_following(&self) {
        if let Some(user) = &mut self.write().current_user {
            user.following_count = user.following_count.saturating_sub(1);
        }
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        {
            let mut s = self.write();
            s.is_loading = true;
            s.last_error = None;
            s.state = SessionState::Authenticating;
        }

        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        match self
            .http
            .post::<AuthResponse, _>(LOGIN_ENDPOINT, &request, None)
            .await
        {
            Ok(response) => self.adopt_auth_response(response),
            Err(e) => Err(self.fail_auth(e.into())),
        }
    }

    #[instrument(skip(self, password, password_confirm))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        password_confirm: &str,
        username: &str,
        bio: &str,
    ) -> Result<(), RegisterError> {
        {
            let mut s = self.write();
            s.is_loading = true;
            s.last_error = None;
            s.state = SessionState::Authenticating;
        }

        let request = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: password_confirm.to_string(),
            bio: bio.to_string(),
        };

        match self
            .http
            .post::<AuthResponse, _>(REGISTER_ENDPOINT, &request, None)
            .await
        {
            Ok(response) => {
                self.adopt_auth_response(response)?;
                Ok(())
            }
            Err(ApiError::Unexpected { status, body }) if status == StatusCode::BAD_REQUEST => {
                let classified = classify_register_failure(&body);
                self.fail_auth(AuthError::Other(classified.to_string()));
                Err(classified)
            }
            Err(e) => Err(self.fail_auth(e.into()).into()),
        }
    }

    /// Installs the tokens and user snapshot from a successful login or
    /// registration, persisting the refresh token before the state flips.
    fn adopt_auth_response(&self, response: AuthResponse) -> Result<(), AuthError> {
        if let Err(e) = self.store.persist_refresh_token(&response.refresh) {
            return Err(self.fail_auth(AuthError::Storage(e)));
        }

        let mut s = self.write();
        s.access_token = Some(response.access);
        s.refresh_token = Some(response.refresh);
        s.current_user = Some(response.user);
        s.is_authenticated = true;
        s.is_loading = false;
        s.last_error = None;
        s.state = SessionState::Authenticated;
        debug!("Authentication successful");
        Ok(())
    }

    fn fail_auth(&self, err: AuthError) -> AuthError {
        warn!("Auth operation failed: {}", err);
        let mut s = self.write();
        s.is_loading = false;
        s.last_error = Some(err.to_string());
        // A failed re-login leaves an existing valid session untouched, so
        // the state flag has to follow is_authenticated.
        s.state = if s.is_authenticated {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        };
        err
    }

    /// Exchanges the held refresh token for a new access token.
    ///
    /// Concurrent callers share one backend call: whoever reaches the gate
    /// second finds a fresh token already installed and returns it instead
    /// of refreshing again. A rejected refresh always cascades to a full
    /// [`logout`](Self::logout); it is never retried.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<String, AuthError> {
        let before = self.access_token();
        let _flight = self.refresh_gate.lock().await;

        let current = self.access_token();
        if current != before {
            if let Some(adopted) = current {
                if !token::is_expired(&adopted) {
                    debug!("Adopting access token refreshed by a concurrent caller");
                    return Ok(adopted);
                }
            }
        }

        let refresh_token = match self.refresh_token() {
            Some(t) if !t.is_empty() => t,
            _ => return Err(AuthError::NoRefreshToken),
        };

        self.write().state = SessionState::Refreshing;

        let request = RefreshRequest {
            refresh: refresh_token.clone(),
        };
        match self
            .http
            .post::<RefreshResponse, _>(TOKEN_REFRESH_ENDPOINT, &request, None)
            .await
        {
            Ok(response) => {
                // Keep the old refresh token unless the backend rotated it.
                let rotated = response.refresh.unwrap_or(refresh_token);
                if let Err(e) = self.store.persist_refresh_token(&rotated) {
                    self.logout();
                    return Err(AuthError::Storage(e));
                }

                let mut s = self.write();
                s.access_token = Some(response.access.clone());
                s.refresh_token = Some(rotated);
                s.is_authenticated = true;
                s.state = SessionState::Authenticated;
                debug!("Access token refreshed");
                Ok(response.access)
            }
            Err(e) => {
                warn!("Refresh rejected, session is no longer valid: {}", e);
                self.logout();
                Err(e.into())
            }
        }
    }

    /// Clears all session state and overwrites the persisted refresh token
    /// with an empty value.
    #[instrument(skip(self))]
    pub fn logout(&self) {
        {
            let mut s = self.write();
            *s = Session::default();
        }
        if let Err(e) = self.store.persist_refresh_token("") {
            error!("Failed to clear persisted refresh token: {}", e);
        }
        debug!("Session cleared");
    }

    /// Startup bootstrap: restores a session from the persisted refresh
    /// token before any protected content is rendered.
    #[instrument(skip(self))]
    pub async fn init_auth(&self) -> Result<(), AuthError> {
        {
            let s = self.read();
            if s.is_authenticated {
                if let Some(access) = &s.access_token {
                    if !token::is_expired(access) {
                        debug!("Session already authenticated with a valid token");
                        return Ok(());
                    }
                }
            }
        }

        self.write().is_loading = true;

        let stored = match self.store.read_refresh_token() {
            Ok(stored) => stored,
            Err(e) => {
                self.logout();
                self.write().last_error = Some(format!("storage error: {e}"));
                return Err(AuthError::Storage(e));
            }
        };

        let Some(stored) = stored else {
            self.logout();
            self.write().last_error = Some(NO_REFRESH_TOKEN_ERROR.to_string());
            debug!("No persisted refresh token, session stays unauthenticated");
            return Err(AuthError::NoRefreshToken);
        };

        self.write().refresh_token = Some(stored);

        let access = match self.refresh().await {
            Ok(access) => access,
            Err(e) => {
                // refresh() has already cascaded to logout
                self.write().last_error = Some("Failed to refresh access token".to_string());
                return Err(e);
            }
        };

        if token::is_expired(&access) {
            self.logout();
            self.write().last_error = Some("Refreshed access token is expired".to_string());
            return Err(AuthError::Other(
                "refreshed access token is already expired".to_string(),
            ));
        }

        match self.get_authorized::<User>(PROFILE_ENDPOINT).await {
            Ok(user) => {
                let mut s = self.write();
                s.current_user = Some(user);
                s.is_authenticated = true;
                s.is_loading = false;
                s.last_error = None;
                s.state = SessionState::Authenticated;
                debug!("Session restored from persisted refresh token");
                Ok(())
            }
            Err(e) => {
                // A profile we cannot load right after a successful refresh
                // is treated the same as a failed refresh.
                warn!("Profile fetch after bootstrap refresh failed: {}", e);
                self.logout();
                self.write().last_error = Some("Failed to load user profile".to_string());
                Err(e.into())
            }
        }
    }

    /// GET with the current access token attached at send time. A 401 gets
    /// exactly one refresh-and-replay; a 401 on the replay propagates.
    pub async fn get_authorized<T: DeserializeOwned + Debug>(
        &self,
        endpoint: &str,
    ) -> Result<T, ApiError> {
        let bearer = self.access_token();
        match self.http.get(endpoint, bearer.as_deref()).await {
            Err(ApiError::Unauthorized) => {
                let fresh = self.refresh().await.map_err(ApiError::from)?;
                self.http.get(endpoint, Some(&fresh)).await
            }
            other => other,
        }
    }

    /// POST variant of [`get_authorized`](Self::get_authorized).
    pub async fn post_authorized<T: DeserializeOwned + Debug, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let bearer = self.access_token();
        match self.http.post(endpoint, body, bearer.as_deref()).await {
            Err(ApiError::Unauthorized) => {
                let fresh = self.refresh().await.map_err(ApiError::from)?;
                self.http.post(endpoint, body, Some(&fresh)).await
            }
            other => other,
        }
    }

    /// PATCH variant of [`get_authorized`](Self::get_authorized).
    pub async fn patch_authorized<T: DeserializeOwned + Debug, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let bearer = self.access_token();
        match self.http.patch(endpoint, body, bearer.as_deref()).await {
            Err(ApiError::Unauthorized) => {
                let fresh = self.refresh().await.map_err(ApiError::from)?;
                self.http.patch(endpoint, body, Some(&fresh)).await
            }
            other => other,
        }
    }

    /// Multipart PATCH variant. A form cannot be sent twice, so the caller
    /// hands over a builder that produces a fresh one for the replay.
    pub async fn patch_multipart_authorized<T: DeserializeOwned + Debug>(
        &self,
        endpoint: &str,
        form: impl Fn() -> reqwest::multipart::Form,
    ) -> Result<T, ApiError> {
        let bearer = self.access_token();
        match self
            .http
            .patch_multipart(endpoint, form(), bearer.as_deref())
            .await
        {
            Err(ApiError::Unauthorized) => {
                let fresh = self.refresh().await.map_err(ApiError::from)?;
                self.http.patch_multipart(endpoint, form(), Some(&fresh)).await
            }
            other => other,
        }
    }
}

impl fmt::Display for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{\"http\":{},\"session\":{}}}", self.http, self.session())
    }
}
