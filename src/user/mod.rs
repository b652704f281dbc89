//! User domain model.

mod repository;
mod service;

pub use repository::*;
pub use service::*;

use serde::{Deserialize, Serialize};

/// Access level of an account. ADMIN is strictly more privileged.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Role-compatibility rule: a USER acts on USER-gated operations,
    /// an ADMIN on both.
    pub fn authorizes(self, target: Role) -> bool {
        match self {
            Role::Admin => true,
            Role::User => target == Role::User,
        }
    }
}

/// User as saved on database.
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow,
)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    pub email_is_confirmed: bool,
    #[serde(skip)]
    pub email_confirmation_code: Option<String>,
    #[serde(skip)]
    pub email_confirmation_sent_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip)]
    pub password_reset_code: Option<String>,
    #[serde(skip)]
    pub password_reset_sent_at: Option<chrono::DateTime<chrono::Utc>>,
    pub dark_theme: bool,
    pub email_notifications_on: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Identity resolved by the access guard and attached to the request.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: i64,
    pub login: String,
    pub role: Role,
}

/// `(id, login)` pair returned by the user listing.
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow,
)]
pub struct UserSummary {
    pub id: i64,
    pub login: String,
}

/// `(id, login, role)` projection returned by `get_user_by_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub login: String,
    pub role: Role,
}
