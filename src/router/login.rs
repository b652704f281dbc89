use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::router::Valid;

pub const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(length(min = 2, max = 30))]
    pub login: String,
    #[validate(length(min = 8, max = 255))]
    pub password: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub user_id: i64,
    pub token_type: String,
    pub token: String,
    pub expires_in: u64,
}

/// Handler to verify credentials and issue an access token.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let user = state.users.login(&body.login, &body.password).await?;
    let token = state
        .token
        .create(user.id)
        .map_err(|err| ServerError::internal("token signing failed", err))?;

    Ok(Json(Response {
        user_id: user.id,
        token_type: TOKEN_TYPE.to_owned(),
        token,
        expires_in: crate::token::EXPIRATION_TIME,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app, make_request, test_state};
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;

    #[tokio::test]
    async fn login_returns_the_registered_identifier() {
        let (state, _) = test_state();
        let id = state
            .users
            .register("alice", "a@x.com", "password-1")
            .await
            .unwrap();

        let response = make_request(
            app(state.clone()),
            Method::POST,
            "/login",
            None,
            json!({ "login": "alice", "password": "password-1" }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: Response = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.user_id, id);
        assert_eq!(parsed.token_type, TOKEN_TYPE);
        assert_eq!(parsed.expires_in, crate::token::EXPIRATION_TIME);

        let claims = state.token.decode(&parsed.token).unwrap();
        assert_eq!(claims.sub, id.to_string());
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let (state, _) = test_state();
        state
            .users
            .register("alice", "a@x.com", "password-1")
            .await
            .unwrap();

        let response = make_request(
            app(state),
            Method::POST,
            "/login",
            None,
            json!({ "login": "alice", "password": "wrong-password" })
                .to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["code"], "WRONG_CREDENTIALS");
    }

    #[tokio::test]
    async fn unknown_login_is_indistinguishable() {
        let (state, _) = test_state();

        let response = make_request(
            app(state),
            Method::POST,
            "/login",
            None,
            json!({ "login": "nobody", "password": "password-1" }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["code"], "WRONG_CREDENTIALS");
    }
}
