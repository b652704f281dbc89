//! Account preferences.

use axum::Extension;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;
use crate::user::CurrentUser;

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    pub dark_theme: bool,
    pub email_notifications_on: bool,
}

pub async fn handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Valid(body): Valid<Body>,
) -> Result<()> {
    state
        .users
        .change_preferences(
            current.id,
            body.dark_theme,
            body.email_notifications_on,
        )
        .await
}

#[cfg(test)]
mod tests {
    use crate::user::UserRepository;
    use crate::{app, make_request, test_state};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn both_flags_are_updated() {
        let (state, repo) = test_state();
        let id = state
            .users
            .register("alice", "a@x.com", "password-1")
            .await
            .unwrap();
        let token = state.token.create(id).unwrap();

        let response = make_request(
            app(state),
            Method::PATCH,
            "/users/@me/preferences",
            Some(&token),
            json!({ "darkTheme": true, "emailNotificationsOn": false })
                .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let user = repo.find_by_id(id).await.unwrap().unwrap();
        assert!(user.dark_theme);
        assert!(!user.email_notifications_on);
    }
}
