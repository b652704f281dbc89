//! Repository port and its PostgreSQL adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{Result, ServerError};
use crate::user::{Role, User, UserSummary};

/// New account row to persist. Role, activation and preferences start
/// from their column defaults.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub login: String,
    pub email: String,
    pub password_hash: String,
}

/// Port for user persistence.
///
/// The store enforces login/email uniqueness itself; implementations
/// surface violations as [`ServerError::LoginInUse`] /
/// [`ServerError::EmailInUse`] so a concurrent duplicate insert cannot
/// slip past a pre-check.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, user: &NewUser) -> Result<i64>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn find_by_login(&self, login: &str) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn update_profile(
        &self,
        id: i64,
        login: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<()>;

    async fn update_role(&self, id: i64, role: Role) -> Result<()>;

    async fn set_active(&self, id: i64, active: bool) -> Result<()>;

    async fn update_preferences(
        &self,
        id: i64,
        dark_theme: bool,
        email_notifications_on: bool,
    ) -> Result<()>;

    async fn set_email_confirmation_code(
        &self,
        id: i64,
        code: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Mark the address confirmed and clear the code (single-use).
    async fn mark_email_confirmed(&self, id: i64) -> Result<()>;

    async fn set_password_reset_code(
        &self,
        id: i64,
        code: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Store the new hash and clear the reset code (single-use).
    async fn reset_password(&self, id: i64, password_hash: &str)
    -> Result<()>;

    /// Page of `(id, login)` pairs ordered by identifier ascending.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<UserSummary>>;

    async fn count(&self) -> Result<i64>;
}

const LOGIN_CONSTRAINT: &str = "users_login_key";
const EMAIL_CONSTRAINT: &str = "users_email_key";

const USER_COLUMNS: &str = "id, login, email, password_hash, role, active, \
    email_is_confirmed, email_confirmation_code, email_confirmation_sent_at, \
    password_reset_code, password_reset_sent_at, dark_theme, \
    email_notifications_on, created_at, updated_at";

#[derive(Debug, Clone)]
enum Field {
    Id,
    Login,
    Email,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Field::Id => write!(f, "id"),
            Field::Login => write!(f, "login"),
            Field::Email => write!(f, "email"),
        }
    }
}

fn get_by_field_query(field: Field) -> String {
    format!("SELECT {USER_COLUMNS} FROM users WHERE {field} = $1")
}

/// Map a unique-constraint violation to its conflict kind.
fn conflict_kind(err: sqlx::Error) -> ServerError {
    if let sqlx::Error::Database(ref db) = err {
        match db.constraint() {
            Some(LOGIN_CONSTRAINT) => return ServerError::LoginInUse,
            Some(EMAIL_CONSTRAINT) => return ServerError::EmailInUse,
            _ => {},
        }
    }
    ServerError::Sql(err)
}

fn ensure_found(rows: u64) -> Result<()> {
    if rows == 0 {
        Err(ServerError::NotFound)
    } else {
        Ok(())
    }
}

/// PostgreSQL-backed [`UserRepository`].
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new [`PgUserRepository`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_field(&self, field: Field, bind: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&get_by_field_query(field))
            .bind(bind)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: &NewUser) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (login, email, password_hash) \
                VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&user.login)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_kind)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&get_by_field_query(Field::Id))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>> {
        self.find_by_field(Field::Login, login).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_by_field(Field::Email, email).await
    }

    async fn update_profile(
        &self,
        id: i64,
        login: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users \
                SET login = $1, email = $2, password_hash = $3, \
                    updated_at = NOW() \
                WHERE id = $4",
        )
        .bind(login)
        .bind(email)
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(conflict_kind)?;

        ensure_found(result.rows_affected())
    }

    async fn update_role(&self, id: i64, role: Role) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET role = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(role)
        .bind(id)
        .execute(&self.pool)
        .await?;

        ensure_found(result.rows_affected())
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET active = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(active)
        .bind(id)
        .execute(&self.pool)
        .await?;

        ensure_found(result.rows_affected())
    }

    async fn update_preferences(
        &self,
        id: i64,
        dark_theme: bool,
        email_notifications_on: bool,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users \
                SET dark_theme = $1, email_notifications_on = $2, \
                    updated_at = NOW() \
                WHERE id = $3",
        )
        .bind(dark_theme)
        .bind(email_notifications_on)
        .bind(id)
        .execute(&self.pool)
        .await?;

        ensure_found(result.rows_affected())
    }

    async fn set_email_confirmation_code(
        &self,
        id: i64,
        code: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users \
                SET email_confirmation_code = $1, \
                    email_confirmation_sent_at = $2, updated_at = NOW() \
                WHERE id = $3",
        )
        .bind(code)
        .bind(sent_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        ensure_found(result.rows_affected())
    }

    async fn mark_email_confirmed(&self, id: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users \
                SET email_is_confirmed = TRUE, \
                    email_confirmation_code = NULL, \
                    email_confirmation_sent_at = NULL, updated_at = NOW() \
                WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        ensure_found(result.rows_affected())
    }

    async fn set_password_reset_code(
        &self,
        id: i64,
        code: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users \
                SET password_reset_code = $1, password_reset_sent_at = $2, \
                    updated_at = NOW() \
                WHERE id = $3",
        )
        .bind(code)
        .bind(sent_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        ensure_found(result.rows_affected())
    }

    async fn reset_password(
        &self,
        id: i64,
        password_hash: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users \
                SET password_hash = $1, password_reset_code = NULL, \
                    password_reset_sent_at = NULL, updated_at = NOW() \
                WHERE id = $2",
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;

        ensure_found(result.rows_affected())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<UserSummary>> {
        let users = sqlx::query_as::<_, UserSummary>(
            "SELECT id, login FROM users ORDER BY id ASC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn count(&self) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }
}

/// In-memory [`UserRepository`] with the same uniqueness semantics as
/// the PostgreSQL adapter, for the test harness.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    inner: std::sync::Mutex<MemoryInner>,
}

#[cfg(test)]
#[derive(Debug, Default)]
struct MemoryInner {
    users: Vec<User>,
    next_id: i64,
}

#[cfg(test)]
impl MemoryUserRepository {
    fn update<F>(&self, id: i64, apply: F) -> Result<()>
    where
        F: FnOnce(&mut User),
    {
        let mut inner = self.inner.lock().unwrap();
        let Some(user) = inner.users.iter_mut().find(|u| u.id == id) else {
            return Err(ServerError::NotFound);
        };
        apply(user);
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn insert(&self, user: &NewUser) -> Result<i64> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.iter().any(|u| u.login == user.login) {
            return Err(ServerError::LoginInUse);
        }
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(ServerError::EmailInUse);
        }

        inner.next_id += 1;
        let id = inner.next_id;
        let now = Utc::now();
        inner.users.push(User {
            id,
            login: user.login.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            role: Role::User,
            active: true,
            email_is_confirmed: false,
            email_confirmation_code: None,
            email_confirmation_sent_at: None,
            password_reset_code: None,
            password_reset_sent_at: None,
            dark_theme: false,
            email_notifications_on: true,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.login == login).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_profile(
        &self,
        id: i64,
        login: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.iter().any(|u| u.id != id && u.login == login) {
            return Err(ServerError::LoginInUse);
        }
        if inner.users.iter().any(|u| u.id != id && u.email == email) {
            return Err(ServerError::EmailInUse);
        }
        let Some(user) = inner.users.iter_mut().find(|u| u.id == id) else {
            return Err(ServerError::NotFound);
        };
        user.login = login.to_owned();
        user.email = email.to_owned();
        user.password_hash = password_hash.to_owned();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_role(&self, id: i64, role: Role) -> Result<()> {
        self.update(id, |user| user.role = role)
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<()> {
        self.update(id, |user| user.active = active)
    }

    async fn update_preferences(
        &self,
        id: i64,
        dark_theme: bool,
        email_notifications_on: bool,
    ) -> Result<()> {
        self.update(id, |user| {
            user.dark_theme = dark_theme;
            user.email_notifications_on = email_notifications_on;
        })
    }

    async fn set_email_confirmation_code(
        &self,
        id: i64,
        code: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<()> {
        self.update(id, |user| {
            user.email_confirmation_code = Some(code.to_owned());
            user.email_confirmation_sent_at = Some(sent_at);
        })
    }

    async fn mark_email_confirmed(&self, id: i64) -> Result<()> {
        self.update(id, |user| {
            user.email_is_confirmed = true;
            user.email_confirmation_code = None;
            user.email_confirmation_sent_at = None;
        })
    }

    async fn set_password_reset_code(
        &self,
        id: i64,
        code: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<()> {
        self.update(id, |user| {
            user.password_reset_code = Some(code.to_owned());
            user.password_reset_sent_at = Some(sent_at);
        })
    }

    async fn reset_password(
        &self,
        id: i64,
        password_hash: &str,
    ) -> Result<()> {
        self.update(id, |user| {
            user.password_hash = password_hash.to_owned();
            user.password_reset_code = None;
            user.password_reset_sent_at = None;
        })
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<UserSummary>> {
        let inner = self.inner.lock().unwrap();
        let mut users: Vec<UserSummary> = inner
            .users
            .iter()
            .map(|u| UserSummary {
                id: u.id,
                login: u.login.clone(),
            })
            .collect();
        users.sort_by_key(|u| u.id);

        Ok(users
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self) -> Result<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.len() as i64)
    }
}
