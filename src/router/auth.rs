//! Registration and login.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;
use crate::user::{User, UserId};

/// `/auth` routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // `POST /auth/register` goes to `register`.
        .route("/register", post(register))
        // `POST /auth/login` goes to `login`.
        .route("/login", post(login))
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterBody {
    #[serde(default)]
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(
        min = 6,
        message = "Password must be at least 6 characters"
    ))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginBody {
    #[serde(default)]
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub username: String,
    pub is_admin: bool,
    pub token: String,
}

impl Response {
    fn new(state: &AppState, user: User) -> Result<Self> {
        Ok(Self {
            token: state.token.create(&user.id.to_string())?,
            id: user.id,
            username: user.username,
            is_admin: user.is_admin,
        })
    }
}

/// Handler to create user.
pub async fn register(
    State(state): State<AppState>,
    Valid(body): Valid<RegisterBody>,
) -> Result<(StatusCode, Json<Response>)> {
    let user = state
        .users
        .register(&body.username, &body.password, false)
        .await?;

    Ok((StatusCode::CREATED, Json(Response::new(&state, user)?)))
}

pub async fn login(
    State(state): State<AppState>,
    Valid(body): Valid<LoginBody>,
) -> Result<Json<Response>> {
    let user = state.users.login(&body.username, &body.password).await?;
    Ok(Json(Response::new(&state, user)?))
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use axum::http::Method;
    use http_body_util::BodyExt;
    use serde_json::json;

    use super::*;
    use crate::error::ResponseError;
    use crate::*;

    async fn post_json(
        state: &AppState,
        path: &str,
        body: serde_json::Value,
    ) -> axum::response::Response {
        make_request(app(state.clone()), Method::POST, path, None, body.to_string()).await
    }

    async fn error_message(response: axum::response::Response) -> String {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice::<ResponseError>(&body).unwrap().message
    }

    #[tokio::test]
    async fn test_register_handler() {
        let state = test_state();
        let response = post_json(
            &state,
            "/auth/register",
            json!({ "username": "user1", "password": "password123" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Response = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.username, "user1");
        assert!(!body.is_admin);

        let claims = state.token.decode(&body.token).unwrap();
        assert_eq!(claims.sub, body.id.to_string());
        assert_eq!(claims.iss, state.config.url);
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        assert!(claims.exp > time);
    }

    #[tokio::test]
    async fn test_register_twice() {
        let state = test_state();
        let body = json!({ "username": "user1", "password": "password123" });
        post_json(&state, "/auth/register", body.clone()).await;

        let response = post_json(&state, "/auth/register", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_message(response).await, error::USER_EXISTS);
    }

    #[tokio::test]
    async fn test_register_with_short_password() {
        let state = test_state();
        let response = post_json(
            &state,
            "/auth/register",
            json!({ "username": "user1", "password": "12345" }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            error_message(response).await,
            "Password must be at least 6 characters"
        );
    }

    #[tokio::test]
    async fn test_login_handler() {
        let state = test_state();
        let (user, _) = test_user(&state, "admin", true).await;

        let response = post_json(
            &state,
            "/auth/login",
            json!({ "username": "admin", "password": TEST_PASSWORD }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: Response = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.id, user.id);
        assert!(body.is_admin);

        let response = post_json(
            &state,
            "/auth/login",
            json!({ "username": "admin", "password": "wrong-password" }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_message(response).await, "Invalid credentials");
    }
}
