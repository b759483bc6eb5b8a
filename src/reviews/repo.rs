use anyhow::Context;
use sqlx::{FromRow, PgExecutor};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub service_id: Uuid,
    pub author_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Review joined with its author's profile card.
#[derive(Debug, Clone, FromRow)]
pub struct ReviewWithAuthor {
    #[sqlx(flatten)]
    pub review: Review,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
}

impl Review {
    /// Every review of a service, newest first.
    pub async fn list_for_service<'e>(
        db: impl PgExecutor<'e>,
        service_id: Uuid,
    ) -> anyhow::Result<Vec<ReviewWithAuthor>> {
        let rows = sqlx::query_as::<_, ReviewWithAuthor>(
            r#"
            SELECT r.id, r.service_id, r.author_id, r.rating, r.comment, r.created_at,
                   p.display_name AS author_name, p.avatar_url AS author_avatar
              FROM reviews r
              LEFT JOIN profiles p ON p.id = r.author_id
             WHERE r.service_id = $1
             ORDER BY r.created_at DESC, r.id
            "#,
        )
        .bind(service_id)
        .fetch_all(db)
        .await
        .context("list reviews")?;
        Ok(rows)
    }

    pub async fn exists_for<'e>(
        db: impl PgExecutor<'e>,
        service_id: Uuid,
        author_id: Uuid,
    ) -> anyhow::Result<bool> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM reviews WHERE service_id = $1 AND author_id = $2)",
        )
        .bind(service_id)
        .bind(author_id)
        .fetch_one(db)
        .await
        .context("review exists")?;
        Ok(found)
    }

    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        service_id: Uuid,
        author_id: Uuid,
        rating: i32,
        comment: Option<&str>,
    ) -> anyhow::Result<Review> {
        let row = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (service_id, author_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING id, service_id, author_id, rating, comment, created_at
            "#,
        )
        .bind(service_id)
        .bind(author_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(db)
        .await
        .context("insert review")?;
        Ok(row)
    }
}
