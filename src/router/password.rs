//! Password reset round trip.
//!
//! The request step issues and mails a code without comparing
//! anything; the confirm step compares the code and accepts the new
//! password.

use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::mail::Template::PasswordReset;
use crate::router::Valid;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RequestBody {
    #[validate(length(min = 2, max = 30))]
    pub login: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ConfirmBody {
    #[validate(length(min = 2, max = 30))]
    pub login: String,
    #[validate(length(equal = 64, message = "Code must be 64 characters."))]
    pub code: String,
    #[validate(length(
        min = 8,
        max = 255,
        message = "Password must contain at least 8 characters."
    ))]
    pub password: String,
}

/// Issue a reset code and dispatch it by mail.
pub async fn request_handler(
    State(state): State<AppState>,
    Valid(body): Valid<RequestBody>,
) -> Result<()> {
    if let Some(issued) = state.users.request_password_reset(&body.login).await?
    {
        if let Err(err) = state
            .mail
            .publish_event(
                PasswordReset,
                &issued.email,
                &issued.login,
                Some(&issued.code),
            )
            .await
        {
            tracing::error!(
                login = body.login,
                error = err.to_string(),
                "password reset mail not published"
            );
        }
    }

    Ok(())
}

/// Compare the reset code and store the new password.
pub async fn confirm_handler(
    State(state): State<AppState>,
    Valid(body): Valid<ConfirmBody>,
) -> Result<()> {
    state
        .users
        .confirm_password_reset(&body.login, &body.code, &body.password)
        .await
}

#[cfg(test)]
mod tests {
    use crate::user::UserRepository;
    use crate::{app, make_request, test_state};
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;

    #[tokio::test]
    async fn reset_round_trip_through_http() {
        let (state, repo) = test_state();
        state
            .users
            .register("bob", "b@x.com", "old-password")
            .await
            .unwrap();

        let response = make_request(
            app(state.clone()),
            Method::POST,
            "/password/reset",
            None,
            json!({ "login": "bob" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        // The code travels by mail; fetch it from the store.
        let code = repo
            .find_by_login("bob")
            .await
            .unwrap()
            .unwrap()
            .password_reset_code
            .expect("request step persists a code");
        assert_eq!(code.len(), 64);

        let response = make_request(
            app(state.clone()),
            Method::POST,
            "/password/reset/confirm",
            None,
            json!({ "login": "bob", "code": code, "password": "new-password" })
                .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let user = state.users.login("bob", "new-password").await.unwrap();
        assert_eq!(user.login, "bob");
        assert!(state.users.login("bob", "old-password").await.is_err());
    }

    #[tokio::test]
    async fn wrong_code_is_rejected() {
        let (state, _) = test_state();
        state
            .users
            .register("bob", "b@x.com", "old-password")
            .await
            .unwrap();

        make_request(
            app(state.clone()),
            Method::POST,
            "/password/reset",
            None,
            json!({ "login": "bob" }).to_string(),
        )
        .await;

        let response = make_request(
            app(state),
            Method::POST,
            "/password/reset/confirm",
            None,
            json!({
                "login": "bob",
                "code": "f".repeat(64),
                "password": "new-password",
            })
            .to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["code"], "CONFIRMATION_CODE_IS_INVALID");
    }

    #[tokio::test]
    async fn unknown_login_reports_success() {
        let (state, _) = test_state();

        let response = make_request(
            app(state),
            Method::POST,
            "/password/reset",
            None,
            json!({ "login": "ghost" }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
    }
}
