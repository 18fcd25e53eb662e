use crate::application::models::user::User;
use crate::constants::{PROFILE_ENDPOINT, USERS_ENDPOINT};
use crate::error::ApiError;
use crate::session::manager::SessionManager;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Fields accepted by the profile update endpoint; absent fields are left
/// untouched by the backend. A picture forces the multipart path.
#[derive(Debug, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip)]
    pub profile_picture: Option<ProfilePicture>,
}

/// Raw image bytes for a profile-picture upload.
#[derive(Debug, Clone)]
pub struct ProfilePicture {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Profile reads and writes for the authenticated principal. Every call goes
/// through the session manager's authorized request path.
pub struct ProfileService {
    session: Arc<SessionManager>,
}

impl ProfileService {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// Fetches the authenticated user's own profile and installs it as the
    /// session's user snapshot.
    #[instrument(skip(self))]
    pub async fn whoami(&self) -> Result<User, ApiError> {
        let user: User = self.session.get_authorized(PROFILE_ENDPOINT).await?;
        debug!("Loaded own profile: {}", user.username);
        self.session.set_current_user(user.clone());
        Ok(user)
    }

    /// Applies a partial profile update and refreshes the session snapshot
    /// with whatever the backend returns. Updates that carry a picture go
    /// out as multipart form data, everything else as plain JSON.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        let user: User = if update.profile_picture.is_some() {
            self.session
                .patch_multipart_authorized(PROFILE_ENDPOINT, || Self::multipart_form(update))
                .await?
        } else {
            self.session
                .patch_authorized(PROFILE_ENDPOINT, update)
                .await?
        };
        self.session.set_current_user(user.clone());
        Ok(user)
    }

    fn multipart_form(update: &ProfileUpdate) -> reqwest::multipart::Form {
        let mut form = reqwest::multipart::Form::new();
        if let Some(username) = &update.username {
            form = form.text("username", username.clone());
        }
        if let Some(bio) = &update.bio {
            form = form.text("bio", bio.clone());
        }
        if let Some(picture) = &update.profile_picture {
            let part = reqwest::multipart::Part::bytes(picture.bytes.clone())
                .file_name(picture.file_name.clone());
            form = form.part("profile_picture", part);
        }
        form
    }

    /// Profile of another user, including the viewer's is_following flag.
    #[instrument(skip(self))]
    pub async fn user_detail(&self, username: &str) -> Result<User, ApiError> {
        self.session
            .get_authorized(&format!("{USERS_ENDPOINT}{username}/"))
            .await
    }
}

#[cfg(test)]
mod tests_profile_service {
    use super::*;
    use crate::config::Config;
    use crate::session::manager::SessionState;
    use crate::storage::MemoryTokenStore;
    use crate::utils::logger::setup_logger;
    use mockito::{Matcher, Server};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn create_service(server_url: &str) -> (ProfileService, Arc<SessionManager>) {
        let mut config = Config::new();
        config.rest_api.base_url = server_url.to_string();
        let manager = Arc::new(
            SessionManager::new(&config, Arc::new(MemoryTokenStore::new())).unwrap(),
        );
        (ProfileService::new(manager.clone()), manager)
    }

    fn user_body(username: &str, bio: &str) -> String {
        json!({
            "id": 1,
            "username": username,
            "email": format!("{username}@example.com"),
            "bio": bio,
            "profile_picture": null,
            "followers_count": 0,
            "following_count": 0,
            "is_following": false,
            "created_at": "2024-01-15T10:30:00Z"
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_whoami_updates_snapshot() {
        setup_logger();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/auth/profile/")
            .match_header("authorization", "Bearer access_1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(user_body("ada", "mathematician"))
            .create_async()
            .await;

        let (service, manager) = create_service(&server.url());
        seed_session(&manager, "access_1");

        let user = service.whoami().await.unwrap();

        assert_eq!(user.username, "ada");
        assert_eq!(manager.current_user().unwrap().username, "ada");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_profile_sends_only_set_fields() {
        setup_logger();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PATCH", "/auth/profile/")
            .match_body(Matcher::Json(json!({"bio": "new bio"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(user_body("ada", "new bio"))
            .create_async()
            .await;

        let (service, manager) = create_service(&server.url());
        seed_session(&manager, "access_1");

        let update = ProfileUpdate {
            bio: Some("new bio".to_string()),
            ..Default::default()
        };
        let user = service.update_profile(&update).await.unwrap();

        assert_eq!(user.bio, "new bio");
        assert_eq!(manager.current_user().unwrap().bio, "new bio");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_profile_with_picture_sends_multipart() {
        setup_logger();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PATCH", "/auth/profile/")
            .match_header(
                "content-type",
                Matcher::Regex("multipart/form-data.*".to_string()),
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="profile_picture""#.to_string()),
                Matcher::Regex(r#"filename="avatar.png""#.to_string()),
                Matcher::Regex("png-bytes".to_string()),
                Matcher::Regex(r#"name="bio""#.to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(user_body("ada", "new bio"))
            .create_async()
            .await;

        let (service, manager) = create_service(&server.url());
        seed_session(&manager, "access_1");

        let update = ProfileUpdate {
            bio: Some("new bio".to_string()),
            profile_picture: Some(ProfilePicture {
                file_name: "avatar.png".to_string(),
                bytes: b"png-bytes".to_vec(),
            }),
            ..Default::default()
        };
        let user = service.update_profile(&update).await.unwrap();

        assert_eq!(user.bio, "new bio");
        assert_eq!(manager.current_user().unwrap().bio, "new bio");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_picture_upload_replays_after_refresh() {
        setup_logger();
        let mut server = Server::new_async().await;
        let rejected = server
            .mock("PATCH", "/auth/profile/")
            .match_header("authorization", "Bearer stale_access")
            .with_status(401)
            .with_body(r#"{"detail": "token expired"}"#)
            .expect(1)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/token/refresh/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access": "fresh_access"}"#)
            .expect(1)
            .create_async()
            .await;
        let accepted = server
            .mock("PATCH", "/auth/profile/")
            .match_header("authorization", "Bearer fresh_access")
            .match_body(Matcher::Regex(r#"filename="avatar.png""#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(user_body("ada", "bio"))
            .expect(1)
            .create_async()
            .await;

        let (service, manager) = create_service(&server.url());
        {
            let mut s = manager.session();
            s.access_token = Some("stale_access".to_string());
            s.refresh_token = Some("refresh_1".to_string());
            s.is_authenticated = true;
            s.state = SessionState::Authenticated;
            manager.set_session(s);
        }

        let update = ProfileUpdate {
            profile_picture: Some(ProfilePicture {
                file_name: "avatar.png".to_string(),
                bytes: b"png-bytes".to_vec(),
            }),
            ..Default::default()
        };
        let user = service.update_profile(&update).await.unwrap();

        assert_eq!(user.username, "ada");
        rejected.assert_async().await;
        refresh.assert_async().await;
        accepted.assert_async().await;
    }

    #[tokio::test]
    async fn test_user_detail() {
        setup_logger();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/auth/users/grace/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(user_body("grace", ""))
            .create_async()
            .await;

        let (service, manager) = create_service(&server.url());
        seed_session(&manager, "access_1");

        let user = service.user_detail("grace").await.unwrap();

        assert_eq!(user.username, "grace");
        // a lookup of someone else never replaces the session snapshot
        assert_eq!(manager.current_user(), None);
        mock.assert_async().await;
    }

    fn seed_session(manager: &Arc<SessionManager>, access: &str) {
        let mut s = manager.session();
        s.access_token = Some(access.to_string());
        s.is_authenticated = true;
        s.state = SessionState::Authenticated;
        manager.set_session(s);
    }
}
