use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::SellerServiceRow;
use crate::orders::dto::OrderResponse;
use crate::orders::status::OrderStatus;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerDashboard {
    pub purchases: Vec<OrderResponse>,
    /// Orders still pending or paid.
    pub active_orders: i64,
    pub total_spent: i64,
}

impl BuyerDashboard {
    pub fn new(purchases: Vec<OrderResponse>) -> Self {
        let active_orders = purchases
            .iter()
            .filter(|o| matches!(o.status, OrderStatus::Pending | OrderStatus::Paid))
            .count() as i64;
        let total_spent = purchases
            .iter()
            .filter(|o| o.status.is_settled())
            .map(|o| i64::from(o.amount))
            .sum();
        Self {
            purchases,
            active_orders,
            total_spent,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerServiceStats {
    pub id: Uuid,
    pub title: String,
    pub price: i32,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub rating: f64,
    pub review_count: i64,
    pub sales: i64,
    pub revenue: i64,
}

impl From<SellerServiceRow> for SellerServiceStats {
    fn from(r: SellerServiceRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            price: r.price,
            is_active: r.is_active,
            created_at: r.created_at,
            rating: r.rating,
            review_count: r.review_count,
            sales: r.sales,
            revenue: r.revenue,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerDashboard {
    pub services: Vec<SellerServiceStats>,
    pub total_revenue: i64,
    pub total_sales: i64,
    pub active_customers: i64,
    /// Mean over all reviews of all the seller's services.
    pub average_rating: f64,
}

impl SellerDashboard {
    pub fn new(rows: Vec<SellerServiceRow>, active_customers: i64) -> Self {
        let total_revenue = rows.iter().map(|r| r.revenue).sum();
        let total_sales = rows.iter().map(|r| r.sales).sum();
        let reviews: i64 = rows.iter().map(|r| r.review_count).sum();
        let average_rating = if reviews == 0 {
            0.0
        } else {
            rows.iter()
                .map(|r| r.rating * r.review_count as f64)
                .sum::<f64>()
                / reviews as f64
        };
        Self {
            services: rows.into_iter().map(Into::into).collect(),
            total_revenue,
            total_sales,
            active_customers,
            average_rating,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn purchase(status: OrderStatus, amount: i32) -> OrderResponse {
        OrderResponse {
            id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            service_title: None,
            buyer_id: Uuid::nil(),
            buyer_name: None,
            seller_id: None,
            seller_name: None,
            status,
            amount,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn row(rating: f64, review_count: i64, sales: i64, revenue: i64) -> SellerServiceRow {
        SellerServiceRow {
            id: Uuid::new_v4(),
            title: "svc".into(),
            price: 10,
            is_active: true,
            created_at: OffsetDateTime::UNIX_EPOCH,
            review_count,
            rating,
            sales,
            revenue,
        }
    }

    #[test]
    fn buyer_totals_count_only_settled_spend() {
        let d = BuyerDashboard::new(vec![
            purchase(OrderStatus::Pending, 10),
            purchase(OrderStatus::Paid, 20),
            purchase(OrderStatus::Completed, 30),
            purchase(OrderStatus::Cancelled, 40),
        ]);
        assert_eq!(d.total_spent, 50);
        assert_eq!(d.active_orders, 2);
    }

    #[test]
    fn seller_rating_is_weighted_by_review_count() {
        let d = SellerDashboard::new(vec![row(5.0, 3, 2, 58), row(2.0, 1, 1, 9), row(0.0, 0, 0, 0)], 2);
        assert_eq!(d.total_revenue, 67);
        assert_eq!(d.total_sales, 3);
        assert!((d.average_rating - 4.25).abs() < 1e-9);
        assert_eq!(d.services.len(), 3);
    }

    #[test]
    fn empty_seller_dashboard() {
        let d = SellerDashboard::new(Vec::new(), 0);
        assert_eq!(d.total_revenue, 0);
        assert_eq!(d.average_rating, 0.0);
        let v = serde_json::to_value(&d).unwrap();
        assert!(v.get("totalRevenue").is_some());
        assert!(v.get("activeCustomers").is_some());
    }
}
