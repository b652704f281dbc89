//! Users-related HTTP API.

mod activation;
mod email;
mod get;
mod list;
mod preferences;
mod role;
mod update;

use axum::routing::{get, patch, post};
use axum::{Router, middleware};

use crate::AppState;
use crate::middleware::{require_admin, require_user};

pub(crate) const ME_ROUTE: &str = "@me";

pub fn router(state: AppState) -> Router<AppState> {
    // `PATCH /users/:ID/role` requires the ADMIN gate.
    let admin = Router::new()
        .route("/{user_id}/role", patch(role::handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ));

    Router::new()
        // `GET /users` goes to the paginated listing.
        .route("/", get(list::handler))
        // `GET /users/:ID` goes to `get`.
        .route("/{user_id}", get(get::handler))
        // `GET /users/@me` and `PATCH /users/@me`. Authorization required.
        .route("/@me", get(get::handler).patch(update::handler))
        .route("/@me/preferences", patch(preferences::handler))
        .route("/@me/activate", post(activation::activate))
        .route("/@me/deactivate", post(activation::deactivate))
        // Email confirmation: POST issues a code, PATCH submits it.
        .route(
            "/@me/email/confirmation",
            post(email::request_handler).patch(email::confirm_handler),
        )
        .route_layer(middleware::from_fn_with_state(state, require_user))
        .merge(admin)
}
