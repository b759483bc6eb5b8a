use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::ValidCategory;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct CategoryWithCount {
    #[sqlx(flatten)]
    pub category: Category,
    pub service_count: i64,
}

impl Category {
    /// All categories ordered by name, with their active service count.
    pub async fn list<'e>(db: impl PgExecutor<'e>) -> anyhow::Result<Vec<CategoryWithCount>> {
        let rows = sqlx::query_as::<_, CategoryWithCount>(
            r#"
            SELECT c.id, c.name, c.slug, c.description, c.icon, c.color, c.created_at,
                   COUNT(s.id) AS service_count
              FROM categories c
              LEFT JOIN services s ON s.category_id = c.id AND s.is_active
             GROUP BY c.id
             ORDER BY c.name
            "#,
        )
        .fetch_all(db)
        .await
        .context("list categories")?;
        Ok(rows)
    }

    pub async fn find_by_slug<'e>(
        db: impl PgExecutor<'e>,
        slug: &str,
    ) -> anyhow::Result<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, slug, description, icon, color, created_at
              FROM categories
             WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(db)
        .await
        .context("find category by slug")?;
        Ok(row)
    }

    pub async fn exists<'e>(db: impl PgExecutor<'e>, id: Uuid) -> anyhow::Result<bool> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1)")
            .bind(id)
            .fetch_one(db)
            .await
            .context("category exists")?;
        Ok(found)
    }

    pub async fn create<'e>(db: impl PgExecutor<'e>, c: &ValidCategory) -> anyhow::Result<Category> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, slug, description, icon, color)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, slug, description, icon, color, created_at
            "#,
        )
        .bind(&c.name)
        .bind(&c.slug)
        .bind(&c.description)
        .bind(&c.icon)
        .bind(&c.color)
        .fetch_one(db)
        .await
        .context("insert category")?;
        Ok(row)
    }

    pub async fn replace<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
        c: &ValidCategory,
    ) -> anyhow::Result<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
               SET name = $2, slug = $3, description = $4, icon = $5, color = $6
             WHERE id = $1
            RETURNING id, name, slug, description, icon, color, created_at
            "#,
        )
        .bind(id)
        .bind(&c.name)
        .bind(&c.slug)
        .bind(&c.description)
        .bind(&c.icon)
        .bind(&c.color)
        .fetch_optional(db)
        .await
        .context("update category")?;
        Ok(row)
    }

    pub async fn delete<'e>(db: impl PgExecutor<'e>, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete category")?;
        Ok(res.rows_affected() > 0)
    }
}
