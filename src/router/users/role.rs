//! Change a user's role.

use axum::Extension;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;
use crate::user::{CurrentUser, Role};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    pub role: Role,
}

pub async fn handler(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    Valid(body): Valid<Body>,
) -> Result<()> {
    state
        .users
        .change_role(current.role, user_id, body.role)
        .await
}
