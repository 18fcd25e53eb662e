use crate::application::models::user::User;
use crate::constants::{FOLLOW_ENDPOINT, UNFOLLOW_ENDPOINT, USERS_ENDPOINT};
use crate::error::ApiError;
use crate::session::manager::SessionManager;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Body of a follow/unfollow call: the target's updated profile plus the
/// resulting relationship.
#[derive(Debug, Deserialize)]
pub struct FollowResponse {
    pub message: String,
    pub user: User,
    pub followed: bool,
}

/// Follow relationships and the follower/following-count bookkeeping they
/// imply on the session's own user snapshot.
pub struct FollowService {
    session: Arc<SessionManager>,
}

impl FollowService {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// Follows `username` and bumps the session user's following count.
    #[instrument(skip(self))]
    pub async fn follow(&self, username: &str) -> Result<FollowResponse, ApiError> {
        let response: FollowResponse = self
            .session
            .post_authorized(&format!("{FOLLOW_ENDPOINT}{username}/"), &json!({}))
            .await?;
        debug!("Followed {}: {}", username, response.message);
        self.session.increment_following();
        Ok(response)
    }

    /// Unfollows `username`; the session user's following count saturates
    /// at zero.
    #[instrument(skip(self))]
    pub async fn unfollow(&self, username: &str) -> Result<FollowResponse, ApiError> {
        let response: FollowResponse = self
            .session
            .post_authorized(&format!("{UNFOLLOW_ENDPOINT}{username}/"), &json!({}))
            .await?;
        debug!("Unfollowed {}: {}", username, response.message);
        self.session.decrement_following();
        Ok(response)
    }

    #[instrument(skip(self))]
    pub async fn followers(&self, username: &str) -> Result<Vec<User>, ApiError> {
        self.session
            .get_authorized(&format!("{USERS_ENDPOINT}{username}/followers/"))
            .await
    }

    #[instrument(skip(self))]
    pub async fn following(&self, username: &str) -> Result<Vec<User>, ApiError> {
        self.session
            .get_authorized(&format!("{USERS_ENDPOINT}{username}/following/"))
            .await
    }
}

#[cfg(test)]
mod tests_follow_service {
    use super::*;
    use crate::config::Config;
    use crate::session::manager::{Session, SessionState};
    use crate::storage::MemoryTokenStore;
    use crate::utils::logger::setup_logger;
    use mockito::Server;
    use pretty_assertions::assert_eq;

    fn create_service(server_url: &str) -> (FollowService, Arc<SessionManager>) {
        let mut config = Config::new();
        config.rest_api.base_url = server_url.to_string();
        let manager = Arc::new(
            SessionManager::new(&config, Arc::new(MemoryTokenStore::new())).unwrap(),
        );
        (FollowService::new(manager.clone()), manager)
    }

    fn seed_session(manager: &Arc<SessionManager>, following_count: u32) {
        let me: User = serde_json::from_value(json!({
            "id": 1,
            "username": "ada",
            "following_count": following_count,
            "created_at": "2024-01-15T10:30:00Z"
        }))
        .unwrap();
        manager.set_session(Session {
            access_token: Some("access_1".to_string()),
            refresh_token: Some("refresh_1".to_string()),
            is_authenticated: true,
            current_user: Some(me),
            is_loading: false,
            last_error: None,
            state: SessionState::Authenticated,
        });
    }

    fn follow_body(username: &str, followed: bool, followers_count: u32) -> String {
        json!({
            "message": if followed { "User followed successfully" } else { "User unfollowed successfully" },
            "user": {
                "id": 2,
                "username": username,
                "followers_count": followers_count,
                "is_following": followed,
                "created_at": "2024-02-01T00:00:00Z"
            },
            "followed": followed
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_follow_bumps_following_count() {
        setup_logger();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/follow/grace/")
            .match_header("authorization", "Bearer access_1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(follow_body("grace", true, 9))
            .create_async()
            .await;

        let (service, manager) = create_service(&server.url());
        seed_session(&manager, 5);

        let response = service.follow("grace").await.unwrap();

        assert!(response.followed);
        assert_eq!(response.user.followers_count, 9);
        assert_eq!(manager.current_user().unwrap().following_count, 6);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unfollow_decrements_following_count() {
        setup_logger();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/unfollow/grace/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(follow_body("grace", false, 8))
            .create_async()
            .await;

        let (service, manager) = create_service(&server.url());
        seed_session(&manager, 5);

        service.unfollow("grace").await.unwrap();

        assert_eq!(manager.current_user().unwrap().following_count, 4);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unfollow_count_saturates_at_zero() {
        setup_logger();
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/unfollow/grace/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(follow_body("grace", false, 0))
            .create_async()
            .await;

        let (service, manager) = create_service(&server.url());
        seed_session(&manager, 0);

        service.unfollow("grace").await.unwrap();

        assert_eq!(manager.current_user().unwrap().following_count, 0);
    }

    #[tokio::test]
    async fn test_follow_error_leaves_count_unchanged() {
        setup_logger();
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/auth/follow/ada/")
            .with_status(400)
            .with_body(r#"{"error": "Cannot follow yourself"}"#)
            .create_async()
            .await;

        let (service, manager) = create_service(&server.url());
        seed_session(&manager, 5);

        let result = service.follow("ada").await;

        assert!(result.is_err());
        assert_eq!(manager.current_user().unwrap().following_count, 5);
    }

    #[tokio::test]
    async fn test_followers_listing() {
        setup_logger();
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/auth/users/ada/followers/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([
                    {"id": 2, "username": "grace", "created_at": "2024-02-01T00:00:00Z"},
                    {"id": 3, "username": "edsger", "created_at": "2024-03-01T00:00:00Z"}
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let (service, manager) = create_service(&server.url());
        seed_session(&manager, 5);

        let followers = service.followers("ada").await.unwrap();

        assert_eq!(followers.len(), 2);
        assert_eq!(followers[0].username, "grace");
        mock.assert_async().await;
    }
}
