use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::mail::Template::Welcome;
use crate::router::Valid;

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

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub user_id: i64,
}

/// Handler to create user.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<(StatusCode, Json<Response>)> {
    let user_id = state
        .users
        .register(&body.login, &body.email, &body.password)
        .await?;

    if let Err(err) = state
        .mail
        .publish_event(Welcome, &body.email, &body.login, None)
        .await
    {
        tracing::error!(
            user_id,
            error = err.to_string(),
            "welcome mail not published"
        );
    }

    Ok((StatusCode::CREATED, Json(Response { user_id })))
}
