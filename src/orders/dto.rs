use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{Order, OrderView};
use super::status::OrderStatus;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub service_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub service_id: Uuid,
    pub service_title: Option<String>,
    pub buyer_id: Uuid,
    pub buyer_name: Option<String>,
    pub seller_id: Option<Uuid>,
    pub seller_name: Option<String>,
    pub status: OrderStatus,
    pub amount: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl TryFrom<Order> for OrderResponse {
    type Error = anyhow::Error;

    fn try_from(o: Order) -> Result<Self, Self::Error> {
        Ok(Self {
            status: o.status()?,
            id: o.id,
            service_id: o.service_id,
            service_title: None,
            buyer_id: o.buyer_id,
            buyer_name: None,
            seller_id: None,
            seller_name: None,
            amount: o.amount,
            created_at: o.created_at,
            updated_at: o.updated_at,
        })
    }
}

impl TryFrom<OrderView> for OrderResponse {
    type Error = anyhow::Error;

    fn try_from(v: OrderView) -> Result<Self, Self::Error> {
        Ok(Self {
            service_title: Some(v.service_title),
            buyer_name: v.buyer_name,
            seller_id: Some(v.seller_id),
            seller_name: v.seller_name,
            ..Self::try_from(v.order)?
        })
    }
}

pub fn to_responses(rows: Vec<OrderView>) -> anyhow::Result<Vec<OrderResponse>> {
    rows.into_iter().map(OrderResponse::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(status: &str) -> Order {
        Order {
            id: Uuid::new_v4(),
            buyer_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            status: status.into(),
            amount: 29,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn view_response_carries_parties() {
        let seller_id = Uuid::new_v4();
        let res = OrderResponse::try_from(OrderView {
            order: order("paid"),
            service_title: "Geocoder".into(),
            seller_id,
            seller_name: Some("Ada".into()),
            buyer_name: None,
        })
        .unwrap();
        assert_eq!(res.status, OrderStatus::Paid);
        assert_eq!(res.seller_id, Some(seller_id));
        let v = serde_json::to_value(&res).unwrap();
        assert_eq!(v["serviceTitle"], "Geocoder");
        assert_eq!(v["status"], "paid");
        assert_eq!(v["createdAt"], "1970-01-01T00:00:00Z");
    }

    #[test]
    fn unknown_stored_status_is_an_error() {
        assert!(OrderResponse::try_from(order("refunded")).is_err());
    }

    #[test]
    fn status_request_rejects_unknown_values() {
        assert!(serde_json::from_str::<UpdateStatusRequest>(r#"{"status":"shipped"}"#).is_err());
        let ok: UpdateStatusRequest = serde_json::from_str(r#"{"status":"completed"}"#).unwrap();
        assert_eq!(ok.status, OrderStatus::Completed);
    }
}
