use anyhow::Context;
use sqlx::{types::Json, FromRow, PgExecutor, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::{AuthType, EndpointSpec, PricingPlan, ServiceDraft, ServiceListItem};
use super::filter::ListingFilter;

#[derive(Debug, Clone, FromRow)]
pub struct Service {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub description: String,
    pub price: i32,
    pub is_active: bool,
    pub short_description: Option<String>,
    pub tags: Vec<String>,
    pub base_url: Option<String>,
    pub auth_type: Option<String>,
    pub endpoints: Json<Vec<EndpointSpec>>,
    pub plans: Json<Vec<PricingPlan>>,
    pub example_code: Option<String>,
    pub documentation: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct ServiceDetailRow {
    #[sqlx(flatten)]
    pub service: Service,
    pub seller_name: Option<String>,
    pub seller_avatar: Option<String>,
    pub category_name: String,
    pub category_slug: String,
    pub review_count: i64,
    pub rating: f64,
}

const SERVICE_COLUMNS: &str = "id, seller_id, category_id, title, description, price, is_active, \
     short_description, tags, base_url, auth_type, endpoints, plans, example_code, \
     documentation, created_at";

fn auth_type_text(t: Option<AuthType>) -> Option<&'static str> {
    t.map(AuthType::as_str)
}

impl Service {
    /// One listing page plus the total number of matches.
    pub async fn list(
        db: &PgPool,
        filter: &ListingFilter,
    ) -> anyhow::Result<(Vec<ServiceListItem>, i64)> {
        let mut count = filter.count_query();
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(db)
            .await
            .context("count listing")?;
        if total == 0 {
            return Ok((Vec::new(), 0));
        }

        let mut page = filter.page_query();
        let items = page
            .build_query_as::<ServiceListItem>()
            .fetch_all(db)
            .await
            .context("list services")?;
        Ok((items, total))
    }

    pub async fn count_active<'e>(db: impl PgExecutor<'e>) -> anyhow::Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM services WHERE is_active")
            .fetch_one(db)
            .await
            .context("count active services")?;
        Ok(n)
    }

    pub async fn find<'e>(db: impl PgExecutor<'e>, id: Uuid) -> anyhow::Result<Option<Service>> {
        let row = sqlx::query_as::<_, Service>(&format!(
            "SELECT {SERVICE_COLUMNS} FROM services WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find service")?;
        Ok(row)
    }

    /// Active service with seller, category and rating aggregate.
    pub async fn find_detail<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
    ) -> anyhow::Result<Option<ServiceDetailRow>> {
        Self::detail_query(db, id, true).await
    }

    /// Detail regardless of `is_active`; the seller still sees a
    /// deactivated listing.
    pub async fn find_owner_detail<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
    ) -> anyhow::Result<Option<ServiceDetailRow>> {
        Self::detail_query(db, id, false).await
    }

    async fn detail_query<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
        listed_only: bool,
    ) -> anyhow::Result<Option<ServiceDetailRow>> {
        let row = sqlx::query_as::<_, ServiceDetailRow>(
            r#"
            SELECT s.id, s.seller_id, s.category_id, s.title, s.description, s.price,
                   s.is_active, s.short_description, s.tags, s.base_url, s.auth_type,
                   s.endpoints, s.plans, s.example_code, s.documentation, s.created_at,
                   p.display_name AS seller_name, p.avatar_url AS seller_avatar,
                   c.name AS category_name, c.slug AS category_slug,
                   COUNT(r.id) AS review_count,
                   COALESCE(AVG(r.rating), 0)::float8 AS rating
              FROM services s
              JOIN categories c ON c.id = s.category_id
              LEFT JOIN profiles p ON p.id = s.seller_id
              LEFT JOIN reviews r ON r.service_id = s.id
             WHERE s.id = $1 AND (s.is_active OR NOT $2)
             GROUP BY s.id, p.id, c.id
            "#,
        )
        .bind(id)
        .bind(listed_only)
        .fetch_optional(db)
        .await
        .context("find service detail")?;
        Ok(row)
    }

    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        seller_id: Uuid,
        d: &ServiceDraft,
    ) -> anyhow::Result<Service> {
        let row = sqlx::query_as::<_, Service>(&format!(
            r#"
            INSERT INTO services (seller_id, category_id, title, description, price,
                                  short_description, tags, base_url, auth_type,
                                  endpoints, plans, example_code, documentation)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {SERVICE_COLUMNS}
            "#
        ))
        .bind(seller_id)
        .bind(d.category_id)
        .bind(&d.title)
        .bind(&d.description)
        .bind(d.price)
        .bind(&d.short_description)
        .bind(&d.tags)
        .bind(&d.base_url)
        .bind(auth_type_text(d.auth_type))
        .bind(Json(&d.endpoints))
        .bind(Json(&d.plans))
        .bind(&d.example_code)
        .bind(&d.documentation)
        .fetch_one(db)
        .await
        .context("insert service")?;
        Ok(row)
    }

    pub async fn update<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
        d: &ServiceDraft,
        is_active: bool,
    ) -> anyhow::Result<Option<Service>> {
        let row = sqlx::query_as::<_, Service>(&format!(
            r#"
            UPDATE services
               SET category_id = $2, title = $3, description = $4, price = $5,
                   short_description = $6, tags = $7, base_url = $8, auth_type = $9,
                   endpoints = $10, plans = $11, example_code = $12, documentation = $13,
                   is_active = $14
             WHERE id = $1
            RETURNING {SERVICE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(d.category_id)
        .bind(&d.title)
        .bind(&d.description)
        .bind(d.price)
        .bind(&d.short_description)
        .bind(&d.tags)
        .bind(&d.base_url)
        .bind(auth_type_text(d.auth_type))
        .bind(Json(&d.endpoints))
        .bind(Json(&d.plans))
        .bind(&d.example_code)
        .bind(&d.documentation)
        .bind(is_active)
        .fetch_optional(db)
        .await
        .context("update service")?;
        Ok(row)
    }

    pub async fn set_active<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
        is_active: bool,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE services SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(is_active)
            .execute(db)
            .await
            .context("set service active")?;
        Ok(res.rows_affected() > 0)
    }
}
