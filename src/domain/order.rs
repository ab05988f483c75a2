use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::Payment;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub subtotal_cents: i64,
    pub total_amount_cents: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_sku: Option<String>,
    pub price_at_purchase_cents: i64,
    pub quantity: i64,
    pub subtotal_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    WaitingConfirmation,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::WaitingConfirmation,
        OrderStatus::Confirmed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::WaitingConfirmation => "WaitingConfirmation",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Accepts the stored form ("WaitingConfirmation") as well as the
    /// snake_case form used in URLs ("waiting_confirmation").
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "pending" => Some(OrderStatus::Pending),
            "waitingconfirmation" => Some(OrderStatus::WaitingConfirmation),
            "confirmed" => Some(OrderStatus::Confirmed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Cancelled)
    }
}

/// Everything that can move an order from one status to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    /// Customer uploaded payment proof.
    SubmitPayment,
    /// Admin approved the payment (or confirmed the order directly).
    Confirm,
    /// Admin cancellation or payment rejection; releases stock.
    Cancel,
    /// The payment window ran out before proof arrived.
    Expire,
}

impl OrderAction {
    /// The transition table. `None` means the action is illegal from `from`.
    pub fn apply(self, from: OrderStatus) -> Option<OrderStatus> {
        use OrderAction::*;
        use OrderStatus::*;

        match (from, self) {
            (Pending, SubmitPayment) => Some(WaitingConfirmation),
            (Pending, Cancel) | (WaitingConfirmation, Cancel) => Some(Cancelled),
            (Pending, Expire) => Some(Cancelled),
            (WaitingConfirmation, Confirm) => Some(Confirmed),
            _ => None,
        }
    }

    /// Statuses this action may start from, used to guard conditional updates.
    pub fn sources(self) -> Vec<OrderStatus> {
        OrderStatus::ALL
            .into_iter()
            .filter(|status| self.apply(*status).is_some())
            .collect()
    }

    /// Which action an admin status write to `target` stands for.
    pub fn for_target(target: OrderStatus) -> Option<Self> {
        match target {
            OrderStatus::Pending => None,
            OrderStatus::WaitingConfirmation => Some(OrderAction::SubmitPayment),
            OrderStatus::Confirmed => Some(OrderAction::Confirm),
            OrderStatus::Cancelled => Some(OrderAction::Cancel),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderAction::SubmitPayment => "submit payment",
            OrderAction::Confirm => "confirm",
            OrderAction::Cancel => "cancel",
            OrderAction::Expire => "expire",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1000, message = "must be between 1 and 1000"))]
    pub quantity: i64,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub order_id: Uuid,
    pub status: String,
}
