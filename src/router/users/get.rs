//! Fetch a user profile.

use axum::extract::{Path, State};
use axum::{Extension, Json};

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::router::users::ME_ROUTE;
use crate::user::{CurrentUser, UserProfile};

pub async fn handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    user_id: Option<Path<String>>,
) -> Result<Json<UserProfile>> {
    let user_id = match user_id {
        Some(Path(id)) if id != ME_ROUTE => {
            id.parse::<i64>().map_err(|_| ServerError::NotFound)?
        },
        _ => current.id,
    };

    Ok(Json(state.users.get_user_by_id(user_id).await?))
}

#[cfg(test)]
mod tests {
    use crate::{app, make_request, test_state};
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn me_resolves_to_the_caller() {
        let (state, _) = test_state();
        let id = state
            .users
            .register("alice", "a@x.com", "password-1")
            .await
            .unwrap();
        let token = state.token.create(id).unwrap();

        let response = make_request(
            app(state),
            Method::GET,
            "/users/@me",
            Some(&token),
            String::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["id"], id);
        assert_eq!(parsed["login"], "alice");
        assert_eq!(parsed["role"], "USER");
    }

    #[tokio::test]
    async fn any_user_can_read_another_profile() {
        let (state, _) = test_state();
        let alice = state
            .users
            .register("alice", "a@x.com", "password-1")
            .await
            .unwrap();
        let bob = state
            .users
            .register("bob", "b@x.com", "password-2")
            .await
            .unwrap();
        let token = state.token.create(alice).unwrap();

        let response = make_request(
            app(state),
            Method::GET,
            &format!("/users/{bob}"),
            Some(&token),
            String::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["login"], "bob");
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let (state, _) = test_state();
        let id = state
            .users
            .register("alice", "a@x.com", "password-1")
            .await
            .unwrap();
        let token = state.token.create(id).unwrap();

        let response = make_request(
            app(state),
            Method::GET,
            "/users/999",
            Some(&token),
            String::new(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["code"], "NOT_FOUND");
    }
}
