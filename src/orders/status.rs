//! Order lifecycle.
//!
//! ```text
//! pending --buyer--> paid --seller--> completed
//!    |                 |
//!    +--buyer/seller-->+--seller--> cancelled
//! ```

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Counted as money spent by the buyer and earned by the seller.
    pub fn is_settled(self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Completed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => anyhow::bail!("unknown order status {other}"),
        }
    }
}

/// Which side of the order the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Buyer,
    Seller,
}

fn allowed(from: OrderStatus, to: OrderStatus, by: Party) -> bool {
    use OrderStatus::*;
    match (from, to) {
        (Pending, Paid) => by == Party::Buyer,
        (Pending, Cancelled) => true,
        (Paid, Completed) | (Paid, Cancelled) => by == Party::Seller,
        _ => false,
    }
}

/// Check a requested transition. Unknown edges are conflicts with the
/// current state; known edges taken by the wrong party are forbidden.
pub fn check_transition(from: OrderStatus, to: OrderStatus, by: Party) -> Result<(), ApiError> {
    if allowed(from, to, by) {
        return Ok(());
    }
    let other = match by {
        Party::Buyer => Party::Seller,
        Party::Seller => Party::Buyer,
    };
    if allowed(from, to, other) {
        return Err(ApiError::Forbidden(format!(
            "Only the {} can move an order from {from} to {to}",
            match other {
                Party::Buyer => "buyer",
                Party::Seller => "seller",
            }
        )));
    }
    Err(ApiError::Conflict(format!(
        "Cannot move an order from {from} to {to}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use OrderStatus::*;

    const ALL: [OrderStatus; 4] = [Pending, Paid, Completed, Cancelled];

    #[test]
    fn permitted_transitions() {
        assert!(check_transition(Pending, Paid, Party::Buyer).is_ok());
        assert!(check_transition(Pending, Cancelled, Party::Buyer).is_ok());
        assert!(check_transition(Pending, Cancelled, Party::Seller).is_ok());
        assert!(check_transition(Paid, Completed, Party::Seller).is_ok());
        assert!(check_transition(Paid, Cancelled, Party::Seller).is_ok());
    }

    #[test]
    fn wrong_party_is_forbidden() {
        let err = check_transition(Pending, Paid, Party::Seller).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        let err = check_transition(Paid, Completed, Party::Buyer).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        let err = check_transition(Paid, Cancelled, Party::Buyer).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn terminal_states_do_not_move() {
        for from in [Completed, Cancelled] {
            for to in ALL {
                for by in [Party::Buyer, Party::Seller] {
                    let err = check_transition(from, to, by).unwrap_err();
                    assert_eq!(err.status(), StatusCode::CONFLICT);
                }
            }
        }
    }

    #[test]
    fn self_and_backward_moves_conflict() {
        for s in ALL {
            assert!(check_transition(s, s, Party::Buyer).is_err());
        }
        let err = check_transition(Paid, Pending, Party::Seller).unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        let err = check_transition(Pending, Completed, Party::Seller).unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn status_text_round_trips() {
        for s in ALL {
            assert_eq!(s.as_str().parse::<OrderStatus>().unwrap(), s);
        }
        assert!("refunded".parse::<OrderStatus>().is_err());
        assert_eq!(serde_json::to_value(Paid).unwrap(), "paid");
    }
}
