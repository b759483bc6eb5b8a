use anyhow::Context;
use sqlx::PgExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

pub use crate::auth::repo_types::{Account, Session, User, Verification, CREDENTIAL_PROVIDER};

const USER_COLUMNS: &str =
    "id, name, email, email_verified, image, role, created_at, updated_at";

impl User {
    /// Find a user by (lowercased) email.
    pub async fn find_by_email<'e>(
        db: impl PgExecutor<'e>,
        email: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    pub async fn find_by_id<'e>(db: impl PgExecutor<'e>, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        name: &str,
        email: &str,
        email_verified: bool,
        image: Option<&str>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, email_verified, image)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(email)
        .bind(email_verified)
        .bind(image)
        .fetch_one(db)
        .await
        .context("insert user")?;
        Ok(user)
    }
}

impl Account {
    pub async fn find_credential<'e>(
        db: impl PgExecutor<'e>,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, provider_id, account_id, password, created_at
            FROM accounts
            WHERE user_id = $1 AND provider_id = $2
            "#,
        )
        .bind(user_id)
        .bind(CREDENTIAL_PROVIDER)
        .fetch_optional(db)
        .await
        .context("find credential account")?;
        Ok(account)
    }

    pub async fn find_by_provider<'e>(
        db: impl PgExecutor<'e>,
        provider_id: &str,
        account_id: &str,
    ) -> anyhow::Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, provider_id, account_id, password, created_at
            FROM accounts
            WHERE provider_id = $1 AND account_id = $2
            "#,
        )
        .bind(provider_id)
        .bind(account_id)
        .fetch_optional(db)
        .await
        .context("find provider account")?;
        Ok(account)
    }

    pub async fn create_credential<'e>(
        db: impl PgExecutor<'e>,
        user_id: Uuid,
        password_hash: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (user_id, provider_id, account_id, password)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(CREDENTIAL_PROVIDER)
        .bind(user_id.to_string())
        .bind(password_hash)
        .execute(db)
        .await
        .context("insert credential account")?;
        Ok(())
    }

    /// Insert a provider link, or refresh the stored provider token when it
    /// already exists.
    pub async fn upsert_social<'e>(
        db: impl PgExecutor<'e>,
        user_id: Uuid,
        provider_id: &str,
        account_id: &str,
        access_token: &str,
        scope: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (user_id, provider_id, account_id, access_token, scope)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (provider_id, account_id)
            DO UPDATE SET access_token = EXCLUDED.access_token,
                          scope = EXCLUDED.scope,
                          updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(provider_id)
        .bind(account_id)
        .bind(access_token)
        .bind(scope)
        .execute(db)
        .await
        .context("upsert provider account")?;
        Ok(())
    }
}

impl Session {
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        user_id: Uuid,
        expires_at: OffsetDateTime,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> anyhow::Result<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (user_id, expires_at, ip_address, user_agent)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, expires_at, ip_address, user_agent, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(expires_at)
        .bind(ip_address)
        .bind(user_agent)
        .fetch_one(db)
        .await
        .context("insert session")?;
        Ok(session)
    }

    pub async fn find<'e>(db: impl PgExecutor<'e>, id: Uuid) -> anyhow::Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, expires_at, ip_address, user_agent, created_at, updated_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find session")?;
        Ok(session)
    }

    /// Push the expiry forward.
    pub async fn extend<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE sessions SET expires_at = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(expires_at)
            .execute(db)
            .await
            .context("extend session")?;
        Ok(())
    }

    pub async fn delete<'e>(db: impl PgExecutor<'e>, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete session")?;
        Ok(res.rows_affected() > 0)
    }
}

impl Verification {
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        identifier: &str,
        value: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO verifications (identifier, value, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(identifier)
        .bind(value)
        .bind(expires_at)
        .execute(db)
        .await
        .context("insert verification")?;
        Ok(())
    }

    /// Delete and return the entry; each value is usable once.
    pub async fn consume<'e>(
        db: impl PgExecutor<'e>,
        identifier: &str,
    ) -> anyhow::Result<Option<Verification>> {
        let row = sqlx::query_as::<_, Verification>(
            r#"
            DELETE FROM verifications
            WHERE identifier = $1
            RETURNING id, identifier, value, expires_at
            "#,
        )
        .bind(identifier)
        .fetch_optional(db)
        .await
        .context("consume verification")?;
        Ok(row)
    }
}
