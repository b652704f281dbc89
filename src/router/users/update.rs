//! Edit the mutable identity fields.

use axum::Extension;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;
use crate::user::CurrentUser;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(
        length(min = 2, max = 30),
        custom(
            function = "crate::router::validate_login",
            message = "Login must be alphanumeric."
        )
    )]
    pub login: String,
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(
        min = 8,
        max = 255,
        message = "Password must contain at least 8 characters."
    ))]
    pub password: String,
}

pub async fn handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Valid(body): Valid<Body>,
) -> Result<()> {
    state
        .users
        .edit_profile(current.id, &body.login, &body.email, &body.password)
        .await
}

#[cfg(test)]
mod tests {
    use crate::{app, make_request, test_state};
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;

    #[tokio::test]
    async fn profile_edit_changes_credentials() {
        let (state, _) = test_state();
        let id = state
            .users
            .register("alice", "a@x.com", "password-1")
            .await
            .unwrap();
        let token = state.token.create(id).unwrap();

        let response = make_request(
            app(state.clone()),
            Method::PATCH,
            "/users/@me",
            Some(&token),
            json!({
                "login": "alice2",
                "email": "a2@x.com",
                "password": "password-2",
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let user = state.users.login("alice2", "password-2").await.unwrap();
        assert_eq!(user.id, id);
        assert!(state.users.login("alice", "password-1").await.is_err());
    }

    #[tokio::test]
    async fn email_collision_has_its_own_code() {
        let (state, _) = test_state();
        let alice = state
            .users
            .register("alice", "a@x.com", "password-1")
            .await
            .unwrap();
        state
            .users
            .register("bob", "b@x.com", "password-2")
            .await
            .unwrap();
        let token = state.token.create(alice).unwrap();

        let response = make_request(
            app(state),
            Method::PATCH,
            "/users/@me",
            Some(&token),
            json!({
                "login": "alice",
                "email": "b@x.com",
                "password": "password-1",
            })
            .to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["code"], "EMAIL_IN_USE");
    }
}
