use anyhow::Context;
use sqlx::{FromRow, PgExecutor};
use time::OffsetDateTime;
use uuid::Uuid;

/// A seller's service with review and settled-sales aggregates.
#[derive(Debug, Clone, FromRow)]
pub struct SellerServiceRow {
    pub id: Uuid,
    pub title: String,
    pub price: i32,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub review_count: i64,
    pub rating: f64,
    pub sales: i64,
    pub revenue: i64,
}

pub async fn seller_services<'e>(
    db: impl PgExecutor<'e>,
    seller_id: Uuid,
) -> anyhow::Result<Vec<SellerServiceRow>> {
    let rows = sqlx::query_as::<_, SellerServiceRow>(
        r#"
        SELECT s.id, s.title, s.price, s.is_active, s.created_at,
               COALESCE(r.review_count, 0) AS review_count,
               COALESCE(r.rating, 0)::float8 AS rating,
               COALESCE(o.sales, 0) AS sales,
               COALESCE(o.revenue, 0) AS revenue
          FROM services s
          LEFT JOIN (
                SELECT service_id, COUNT(*) AS review_count, AVG(rating)::float8 AS rating
                  FROM reviews
                 GROUP BY service_id
               ) r ON r.service_id = s.id
          LEFT JOIN (
                SELECT service_id, COUNT(*) AS sales, SUM(amount)::int8 AS revenue
                  FROM orders
                 WHERE status IN ('paid', 'completed')
                 GROUP BY service_id
               ) o ON o.service_id = s.id
         WHERE s.seller_id = $1
         ORDER BY s.created_at DESC, s.id
        "#,
    )
    .bind(seller_id)
    .fetch_all(db)
    .await
    .context("seller dashboard services")?;
    Ok(rows)
}

/// Distinct buyers with a paid or completed order on the seller's services.
pub async fn active_customers<'e>(db: impl PgExecutor<'e>, seller_id: Uuid) -> anyhow::Result<i64> {
    let n: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(DISTINCT o.buyer_id)
          FROM orders o
          JOIN services s ON s.id = o.service_id
         WHERE s.seller_id = $1 AND o.status IN ('paid', 'completed')
        "#,
    )
    .bind(seller_id)
    .fetch_one(db)
    .await
    .context("count active customers")?;
    Ok(n)
}
