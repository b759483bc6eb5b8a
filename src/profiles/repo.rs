use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Aggregates over a seller's active services.
#[derive(Debug, Clone, FromRow)]
pub struct SellerStats {
    pub service_count: i64,
    pub review_count: i64,
    pub average_rating: f64,
}

impl Profile {
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        user_id: Uuid,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> anyhow::Result<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (user_id, display_name, avatar_url)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, display_name, bio, avatar_url, created_at
            "#,
        )
        .bind(user_id)
        .bind(display_name)
        .bind(avatar_url)
        .fetch_one(db)
        .await
        .context("insert profile")?;
        Ok(profile)
    }

    pub async fn find_by_user<'e>(
        db: impl PgExecutor<'e>,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, user_id, display_name, bio, avatar_url, created_at
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("find profile by user")?;
        Ok(profile)
    }

    pub async fn find<'e>(db: impl PgExecutor<'e>, id: Uuid) -> anyhow::Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, user_id, display_name, bio, avatar_url, created_at
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find profile")?;
        Ok(profile)
    }

    pub async fn update<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
        display_name: Option<&str>,
        bio: Option<&str>,
        avatar_url: Option<&str>,
    ) -> anyhow::Result<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
               SET display_name = COALESCE($2, display_name),
                   bio = CASE WHEN $3::text IS NULL THEN bio ELSE NULLIF($3, '') END,
                   avatar_url = CASE WHEN $4::text IS NULL THEN avatar_url ELSE NULLIF($4, '') END
             WHERE id = $1
            RETURNING id, user_id, display_name, bio, avatar_url, created_at
            "#,
        )
        .bind(id)
        .bind(display_name)
        .bind(bio)
        .bind(avatar_url)
        .fetch_one(db)
        .await
        .context("update profile")?;
        Ok(profile)
    }

    pub async fn seller_stats<'e>(db: impl PgExecutor<'e>, id: Uuid) -> anyhow::Result<SellerStats> {
        let stats = sqlx::query_as::<_, SellerStats>(
            r#"
            SELECT COUNT(DISTINCT s.id)                    AS service_count,
                   COUNT(r.id)                             AS review_count,
                   COALESCE(AVG(r.rating), 0)::float8      AS average_rating
              FROM services s
              LEFT JOIN reviews r ON r.service_id = s.id
             WHERE s.seller_id = $1 AND s.is_active
            "#,
        )
        .bind(id)
        .fetch_one(db)
        .await
        .context("seller stats")?;
        Ok(stats)
    }
}
