//! Toggle account activation.

use axum::Extension;
use axum::extract::State;

use crate::AppState;
use crate::error::Result;
use crate::user::CurrentUser;

pub async fn deactivate(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<()> {
    state.users.deactivate_profile(current.id).await
}

pub async fn activate(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<()> {
    state.users.activate_profile(current.id).await
}

#[cfg(test)]
mod tests {
    use crate::user::UserRepository;
    use crate::{app, make_request, test_state};
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn activation_round_trip() {
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
            "/users/@me/deactivate",
            Some(&token),
            String::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!repo.find_by_id(id).await.unwrap().unwrap().active);

        // A deactivated account still authenticates and can reactivate.
        let response = make_request(
            app(state),
            Method::POST,
            "/users/@me/activate",
            Some(&token),
            String::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(repo.find_by_id(id).await.unwrap().unwrap().active);
    }
}
