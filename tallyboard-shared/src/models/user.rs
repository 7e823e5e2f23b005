/// User accounts
///
/// A user belongs to any number of businesses through `business_members`.
/// Invited users exist before they have a password: they are created with
/// status `invited`, a hashed one-time token, and an expiry, and become
/// `active` when they accept.
///
/// Emails are stored lowercase and matched case-insensitively
/// (`users_email_key` is a unique index on `LOWER(email)`).
///
/// # Example
///
/// ```no_run
/// use tallyboard_shared::models::user::{CreateUser, User};
/// use tallyboard_shared::auth::password::hash_password;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let user = User::create(&pool, CreateUser {
///     name: "Ada Lovelace".to_string(),
///     email: "Ada@Example.com".to_string(),
///     password_hash: hash_password("analytical-engine-1")?,
/// }).await?;
///
/// assert_eq!(user.email, "ada@example.com");
/// let same = User::find_by_email(&pool, "ADA@example.com").await?;
/// assert!(same.is_some());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use tracing::info;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, password_hash, role, status, \
    invitation_token_hash, invitation_expires_at, two_factor_secret, two_factor_enabled, \
    last_login_at, created_at, updated_at";

/// Platform-wide role, independent of any business membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Invited,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Invited => "invited",
            UserStatus::Suspended => "suspended",
        }
    }
}

/// A user row
///
/// Secrets (`password_hash`, invitation token hash, TOTP secret) are never
/// serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,

    /// Argon2id PHC string; `None` only while `status` is `invited`
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,

    pub role: UserRole,
    pub status: UserStatus,

    #[serde(skip_serializing, default)]
    pub invitation_token_hash: Option<String>,

    pub invitation_expires_at: Option<DateTime<Utc>>,

    /// Base32 TOTP secret, present from setup onwards
    #[serde(skip_serializing, default)]
    pub two_factor_secret: Option<String>,

    pub two_factor_enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    /// Already-hashed password, never plaintext
    pub password_hash: String,
}

/// Input for creating a user who has been invited but has not signed up
#[derive(Debug, Clone)]
pub struct CreateInvitedUser {
    pub name: String,
    pub email: String,
    pub invitation_token_hash: String,
    pub invitation_expires_at: DateTime<Utc>,
}

/// Profile changes; `None` fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}

/// Lowercases and trims an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn is_invited(&self) -> bool {
        self.status == UserStatus::Invited
    }

    /// True while the invitation can still be accepted
    pub fn invitation_pending(&self, now: DateTime<Utc>) -> bool {
        self.is_invited()
            && self.invitation_token_hash.is_some()
            && self.invitation_expires_at.map_or(false, |expires| expires > now)
    }

    /// Inserts an active user
    ///
    /// Accepts any executor so registration can run inside a transaction.
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `users_email_key` if the email is
    /// already registered.
    pub async fn create<'e, E>(executor: E, data: CreateUser) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "INSERT INTO users (name, email, password_hash, status)
             VALUES ($1, $2, $3, 'active')
             RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(data.name.trim())
            .bind(normalize_email(&data.email))
            .bind(data.password_hash)
            .fetch_one(executor)
            .await
    }

    /// Inserts a user in the `invited` state with no password
    pub async fn create_invited<'e, E>(
        executor: E,
        data: CreateInvitedUser,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "INSERT INTO users (name, email, status, invitation_token_hash, invitation_expires_at)
             VALUES ($1, $2, 'invited', $3, $4)
             RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(data.name.trim())
            .bind(normalize_email(&data.email))
            .bind(data.invitation_token_hash)
            .bind(data.invitation_expires_at)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Case-insensitive lookup
    pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(email.trim())
            .fetch_optional(executor)
            .await
    }

    /// Updates name and/or email
    ///
    /// Returns `None` if the user does not exist. An empty update just
    /// touches `updated_at`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use tallyboard_shared::models::user::{User, UpdateUser};
    /// # use sqlx::PgPool;
    /// # use uuid::Uuid;
    /// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    /// let update = UpdateUser {
    ///     name: Some("Ada King".to_string()),
    ///     ..Default::default()
    /// };
    /// let user = User::update(&pool, user_id, update).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.email.is_some() {
            bind_count += 1;
            query.push_str(&format!(", email = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {}", USER_COLUMNS));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(name.trim().to_string());
        }
        if let Some(email) = data.email {
            q = q.bind(normalize_email(&email));
        }

        q.fetch_optional(pool).await
    }

    pub async fn update_password(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replaces the invitation token of a user who is still `invited`
    ///
    /// Returns `false` if the user has already accepted (or does not exist).
    pub async fn set_invitation<'e, E>(
        executor: E,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET invitation_token_hash = $2, invitation_expires_at = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'invited'
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Finds the invited user holding an unexpired token with this digest
    pub async fn find_by_invitation_token(
        pool: &PgPool,
        token_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM users
             WHERE invitation_token_hash = $1
               AND status = 'invited'
               AND invitation_expires_at > NOW()",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(token_hash)
            .fetch_optional(pool)
            .await
    }

    /// Activates an invited user with their chosen password
    ///
    /// The token is consumed in the same statement, so a token can only be
    /// accepted once. Returns `None` if the user is no longer `invited`.
    pub async fn accept_invitation(
        pool: &PgPool,
        id: Uuid,
        name: Option<String>,
        password_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            "UPDATE users
             SET status = 'active',
                 password_hash = $2,
                 name = COALESCE($3, name),
                 invitation_token_hash = NULL,
                 invitation_expires_at = NULL,
                 updated_at = NOW()
             WHERE id = $1 AND status = 'invited'
             RETURNING {}",
            USER_COLUMNS
        );

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(password_hash)
            .bind(name.map(|n| n.trim().to_string()))
            .fetch_optional(pool)
            .await?;

        if let Some(ref user) = user {
            info!(user_id = %user.id, "Invitation accepted");
        }

        Ok(user)
    }

    /// Stores a new TOTP secret and leaves two-factor disabled until a code is confirmed
    pub async fn set_two_factor_secret(
        pool: &PgPool,
        id: Uuid,
        secret: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET two_factor_secret = $2, two_factor_enabled = FALSE, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(secret)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Turns two-factor on; `false` if no secret has been set up
    pub async fn enable_two_factor(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET two_factor_enabled = TRUE, updated_at = NOW()
            WHERE id = $1 AND two_factor_secret IS NOT NULL
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Turns two-factor off and discards the secret
    pub async fn disable_two_factor(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET two_factor_enabled = FALSE, two_factor_secret = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Expires every invitation whose deadline has passed
    ///
    /// In one transaction, for each invited user whose token expired: their
    /// project memberships are removed, their tasks unassigned, their
    /// business memberships removed, and the token cleared. The user rows
    /// stay so a later invitation can reuse them. Returns the number of
    /// users expired.
    pub async fn expire_invitations(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        // Lock the expired rows so an acceptance can't interleave with the cleanup
        let expired: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM users
            WHERE status = 'invited'
              AND invitation_expires_at IS NOT NULL
              AND invitation_expires_at <= NOW()
            FOR UPDATE
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        if expired.is_empty() {
            return Ok(0);
        }

        sqlx::query("DELETE FROM project_members WHERE user_id = ANY($1)")
            .bind(&expired)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE tasks SET assignee_id = NULL, updated_at = NOW() WHERE assignee_id = ANY($1)",
        )
        .bind(&expired)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM business_members WHERE user_id = ANY($1)")
            .bind(&expired)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET invitation_token_hash = NULL, invitation_expires_at = NULL, updated_at = NOW()
            WHERE id = ANY($1)
            "#,
        )
        .bind(&expired)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(result.rows_affected())
    }

    /// Permanently deletes the user
    ///
    /// Fails with a foreign-key violation while the user still owns a
    /// business or a project.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invited(expires_at: Option<DateTime<Utc>>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
            password_hash: None,
            role: UserRole::User,
            status: UserStatus::Invited,
            invitation_token_hash: Some("ab".repeat(32)),
            invitation_expires_at: expires_at,
            two_factor_secret: None,
            two_factor_enabled: false,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn test_invitation_pending() {
        let now = Utc::now();

        assert!(invited(Some(now + Duration::hours(1))).invitation_pending(now));
        assert!(!invited(Some(now - Duration::seconds(1))).invitation_pending(now));
        assert!(!invited(None).invitation_pending(now));

        let mut accepted = invited(Some(now + Duration::hours(1)));
        accepted.status = UserStatus::Active;
        assert!(!accepted.invitation_pending(now));
        assert!(accepted.is_active());
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut user = invited(None);
        user.password_hash = Some("$argon2id$...".to_string());
        user.two_factor_secret = Some("JBSWY3DPEHPK3PXP".to_string());

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("invitation_token_hash").is_none());
        assert!(json.get("two_factor_secret").is_none());
        assert_eq!(json["status"], "invited");
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn test_update_user_is_empty() {
        assert!(UpdateUser::default().is_empty());
        assert!(!UpdateUser {
            name: Some("x".into()),
            ..Default::default()
        }
        .is_empty());
    }
}
