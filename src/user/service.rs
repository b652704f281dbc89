//! Identity service: account lifecycle operations.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{self, PasswordManager};
use crate::error::{Result, ServerError};
use crate::user::{NewUser, Role, User, UserProfile, UserRepository, UserSummary};

/// How long an emailed code stays valid, in minutes.
const CODE_TTL_MINUTES: i64 = 30;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// One page of the user listing, ordered by identifier ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPage {
    pub users: Vec<UserSummary>,
    pub total: i64,
    pub limit: i64,
    pub page: i64,
}

/// A code issued for an email round trip, with the address it must be
/// sent to. The code itself never appears in an HTTP response.
#[derive(Debug)]
pub struct IssuedCode {
    pub email: String,
    pub login: String,
    pub code: String,
}

/// User manager.
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    pwd: Arc<PasswordManager>,
}

impl UserService {
    /// Create a new [`UserService`].
    pub fn new(repo: Arc<dyn UserRepository>, pwd: Arc<PasswordManager>) -> Self {
        Self { repo, pwd }
    }

    /// Create an account. Login and email must both be free.
    pub async fn register(
        &self,
        login: &str,
        email: &str,
        password: &str,
    ) -> Result<i64> {
        if self.repo.find_by_login(login).await?.is_some() {
            return Err(ServerError::LoginInUse);
        }
        if self.repo.find_by_email(email).await?.is_some() {
            return Err(ServerError::EmailInUse);
        }

        let password_hash = self.hash(password)?;

        // The store's unique constraints close the check-then-insert
        // race; a concurrent duplicate surfaces the same conflict kind.
        self.repo
            .insert(&NewUser {
                login: login.to_owned(),
                email: email.to_owned(),
                password_hash,
            })
            .await
    }

    /// Verify credentials. Unknown login and wrong password are
    /// indistinguishable to the caller.
    pub async fn login(&self, login: &str, password: &str) -> Result<User> {
        let Some(user) = self.repo.find_by_login(login).await? else {
            return Err(ServerError::WrongCredentials);
        };

        let matches = self
            .pwd
            .verify_password(password, &user.password_hash)
            .map_err(|err| {
                ServerError::internal("stored password hash is unreadable", err)
            })?;
        if !matches {
            return Err(ServerError::WrongCredentials);
        }

        Ok(user)
    }

    /// Issue a fresh email confirmation code.
    pub async fn request_email_confirmation(
        &self,
        user_id: i64,
    ) -> Result<IssuedCode> {
        let Some(user) = self.repo.find_by_id(user_id).await? else {
            // The guard resolved this id moments ago.
            return Err(ServerError::inconsistency(format!(
                "authenticated user {user_id} has no account row"
            )));
        };
        if user.email_is_confirmed {
            return Err(ServerError::AlreadyConfirmed);
        }

        let code = crypto::generate_code();
        self.repo
            .set_email_confirmation_code(user_id, &code, Utc::now())
            .await?;

        Ok(IssuedCode {
            email: user.email,
            login: user.login,
            code,
        })
    }

    /// Compare the submitted code with the most recently issued one
    /// and mark the address confirmed on match.
    pub async fn confirm_email(&self, user_id: i64, code: &str) -> Result<()> {
        let Some(user) = self.repo.find_by_id(user_id).await? else {
            return Err(ServerError::inconsistency(format!(
                "authenticated user {user_id} has no account row"
            )));
        };

        if !code_matches(
            user.email_confirmation_code.as_deref(),
            user.email_confirmation_sent_at,
            code,
        ) {
            return Err(ServerError::InvalidConfirmationCode);
        }

        self.repo.mark_email_confirmed(user_id).await
    }

    /// Update the three mutable identity fields.
    pub async fn edit_profile(
        &self,
        user_id: i64,
        login: &str,
        email: &str,
        password: &str,
    ) -> Result<()> {
        if let Some(other) = self.repo.find_by_login(login).await? {
            if other.id != user_id {
                return Err(ServerError::LoginInUse);
            }
        }
        if let Some(other) = self.repo.find_by_email(email).await? {
            if other.id != user_id {
                return Err(ServerError::EmailInUse);
            }
        }

        let password_hash = self.hash(password)?;
        self.repo
            .update_profile(user_id, login, email, &password_hash)
            .await
    }

    /// Update a user's role. ADMIN-only by contract, wherever the
    /// call comes from.
    pub async fn change_role(
        &self,
        caller_role: Role,
        user_id: i64,
        role: Role,
    ) -> Result<()> {
        if caller_role != Role::Admin {
            return Err(ServerError::AccessDenied);
        }

        self.repo.update_role(user_id, role).await
    }

    pub async fn deactivate_profile(&self, user_id: i64) -> Result<()> {
        self.repo.set_active(user_id, false).await
    }

    pub async fn activate_profile(&self, user_id: i64) -> Result<()> {
        self.repo.set_active(user_id, true).await
    }

    pub async fn change_preferences(
        &self,
        user_id: i64,
        dark_theme: bool,
        email_notifications_on: bool,
    ) -> Result<()> {
        self.repo
            .update_preferences(user_id, dark_theme, email_notifications_on)
            .await
    }

    /// Issue a password reset code.
    ///
    /// An unknown login succeeds without dispatch so callers cannot
    /// enumerate accounts.
    pub async fn request_password_reset(
        &self,
        login: &str,
    ) -> Result<Option<IssuedCode>> {
        let Some(user) = self.repo.find_by_login(login).await? else {
            tracing::debug!(login, "password reset requested for unknown login");
            return Ok(None);
        };

        let code = crypto::generate_code();
        self.repo
            .set_password_reset_code(user.id, &code, Utc::now())
            .await?;

        Ok(Some(IssuedCode {
            email: user.email,
            login: user.login,
            code,
        }))
    }

    /// Compare the submitted reset code and store the new password on
    /// match.
    pub async fn confirm_password_reset(
        &self,
        login: &str,
        code: &str,
        new_password: &str,
    ) -> Result<()> {
        let Some(user) = self.repo.find_by_login(login).await? else {
            return Err(ServerError::InvalidConfirmationCode);
        };

        if !code_matches(
            user.password_reset_code.as_deref(),
            user.password_reset_sent_at,
            code,
        ) {
            return Err(ServerError::InvalidConfirmationCode);
        }

        let password_hash = self.hash(new_password)?;
        self.repo.reset_password(user.id, &password_hash).await
    }

    /// Page of `(id, login)` pairs ordered by identifier ascending.
    pub async fn get_all_users(
        &self,
        limit: Option<i64>,
        page: Option<i64>,
    ) -> Result<UserPage> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let page = page.unwrap_or(1).max(1);

        let users = self.repo.list(limit, limit * (page - 1)).await?;
        let total = self.repo.count().await?;

        Ok(UserPage {
            users,
            total,
            limit,
            page,
        })
    }

    /// `(id, login, role)` projection of one user.
    pub async fn get_user_by_id(&self, user_id: i64) -> Result<UserProfile> {
        let Some(user) = self.repo.find_by_id(user_id).await? else {
            return Err(ServerError::NotFound);
        };

        Ok(UserProfile {
            id: user.id,
            login: user.login,
            role: user.role,
        })
    }

    fn hash(&self, password: &str) -> Result<String> {
        self.pwd.hash_password(password).map_err(|err| {
            ServerError::internal("password hashing failed", err)
        })
    }
}

/// A stored code authorizes its step only while unexpired and equal to
/// the submitted one.
fn code_matches(
    stored: Option<&str>,
    sent_at: Option<DateTime<Utc>>,
    submitted: &str,
) -> bool {
    match (stored, sent_at) {
        (Some(stored), Some(sent_at)) => {
            stored == submitted
                && Utc::now() - sent_at <= Duration::minutes(CODE_TTL_MINUTES)
        },
        _ => false,
    }
}
