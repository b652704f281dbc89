//! Email confirmation round trip.

use axum::Extension;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::mail::Template::EmailConfirmation;
use crate::router::Valid;
use crate::user::CurrentUser;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ConfirmBody {
    #[validate(length(equal = 64, message = "Code must be 64 characters."))]
    pub code: String,
}

/// Issue a confirmation code and dispatch it by mail.
pub async fn request_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<()> {
    let issued = state.users.request_email_confirmation(current.id).await?;

    if let Err(err) = state
        .mail
        .publish_event(
            EmailConfirmation,
            &issued.email,
            &issued.login,
            Some(&issued.code),
        )
        .await
    {
        tracing::error!(
            user_id = current.id,
            error = err.to_string(),
            "confirmation mail not published"
        );
    }

    Ok(())
}

/// Compare the submitted code and mark the address confirmed.
pub async fn confirm_handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Valid(body): Valid<ConfirmBody>,
) -> Result<()> {
    state.users.confirm_email(current.id, &body.code).await
}

#[cfg(test)]
mod tests {
    use crate::user::UserRepository;
    use crate::{app, make_request, test_state};
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;

    #[tokio::test]
    async fn confirmation_round_trip_through_http() {
        let (state, repo) = test_state();
        let id = state
            .users
            .register("alice", "a@x.com", "password-1")
            .await
            .unwrap();
        let token = state.token.create(id).unwrap();

        let response = make_request(
            app(state.clone()),
            Method::POST,
            "/users/@me/email/confirmation",
            Some(&token),
            String::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        // The code travels by mail; fetch it from the store.
        let code = repo
            .find_by_id(id)
            .await
            .unwrap()
            .unwrap()
            .email_confirmation_code
            .expect("request step persists a code");

        let response = make_request(
            app(state.clone()),
            Method::PATCH,
            "/users/@me/email/confirmation",
            Some(&token),
            json!({ "code": "f".repeat(64) }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = make_request(
            app(state.clone()),
            Method::PATCH,
            "/users/@me/email/confirmation",
            Some(&token),
            json!({ "code": code }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(repo.find_by_id(id).await.unwrap().unwrap().email_is_confirmed);

        // Confirming twice fails on the second request, not on confirm.
        let response = make_request(
            app(state),
            Method::POST,
            "/users/@me/email/confirmation",
            Some(&token),
            String::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["code"], "ALREADY_CONFIRMED");
    }
}
