use anyhow::Context;
use sqlx::{FromRow, PgExecutor};
use time::OffsetDateTime;
use uuid::Uuid;

use super::status::OrderStatus;

#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub service_id: Uuid,
    pub status: String,
    pub amount: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Order {
    pub fn status(&self) -> anyhow::Result<OrderStatus> {
        self.status.parse()
    }
}

/// Order with the service and both parties resolved.
#[derive(Debug, Clone, FromRow)]
pub struct OrderView {
    #[sqlx(flatten)]
    pub order: Order,
    pub service_title: String,
    pub seller_id: Uuid,
    pub seller_name: Option<String>,
    pub buyer_name: Option<String>,
}

const VIEW_SELECT: &str = r#"
    SELECT o.id, o.buyer_id, o.service_id, o.status, o.amount, o.created_at, o.updated_at,
           s.title AS service_title, s.seller_id,
           sp.display_name AS seller_name, bp.display_name AS buyer_name
      FROM orders o
      JOIN services s ON s.id = o.service_id
      LEFT JOIN profiles sp ON sp.id = s.seller_id
      LEFT JOIN profiles bp ON bp.id = o.buyer_id
"#;

impl Order {
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        buyer_id: Uuid,
        service_id: Uuid,
        amount: i32,
    ) -> anyhow::Result<Order> {
        let row = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (buyer_id, service_id, amount)
            VALUES ($1, $2, $3)
            RETURNING id, buyer_id, service_id, status, amount, created_at, updated_at
            "#,
        )
        .bind(buyer_id)
        .bind(service_id)
        .bind(amount)
        .fetch_one(db)
        .await
        .context("insert order")?;
        Ok(row)
    }

    pub async fn find_view<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
    ) -> anyhow::Result<Option<OrderView>> {
        let row = sqlx::query_as::<_, OrderView>(&format!("{VIEW_SELECT} WHERE o.id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
            .context("find order")?;
        Ok(row)
    }

    /// Orders placed by a buyer, newest first.
    pub async fn list_for_buyer<'e>(
        db: impl PgExecutor<'e>,
        buyer_id: Uuid,
    ) -> anyhow::Result<Vec<OrderView>> {
        let rows = sqlx::query_as::<_, OrderView>(&format!(
            "{VIEW_SELECT} WHERE o.buyer_id = $1 ORDER BY o.created_at DESC, o.id"
        ))
        .bind(buyer_id)
        .fetch_all(db)
        .await
        .context("list purchases")?;
        Ok(rows)
    }

    /// Orders for any of a seller's services, newest first.
    pub async fn list_for_seller<'e>(
        db: impl PgExecutor<'e>,
        seller_id: Uuid,
    ) -> anyhow::Result<Vec<OrderView>> {
        let rows = sqlx::query_as::<_, OrderView>(&format!(
            "{VIEW_SELECT} WHERE s.seller_id = $1 ORDER BY o.created_at DESC, o.id"
        ))
        .bind(seller_id)
        .fetch_all(db)
        .await
        .context("list sales")?;
        Ok(rows)
    }

    /// Compare-and-set on the status; `None` if it moved concurrently.
    pub async fn transition<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> anyhow::Result<Option<Order>> {
        let row = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
               SET status = $3, updated_at = now()
             WHERE id = $1 AND status = $2
            RETURNING id, buyer_id, service_id, status, amount, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(db)
        .await
        .context("update order status")?;
        Ok(row)
    }
}
