use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: PaymentStatus,
    pub amount_cents: i64,
    pub proof_image: Option<String>,
    pub admin_note: Option<String>,
    pub verified_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Unpaid,
    Submitted,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "Unpaid",
            PaymentStatus::Submitted => "Submitted",
            PaymentStatus::Approved => "Approved",
            PaymentStatus::Rejected => "Rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Unpaid" => Some(PaymentStatus::Unpaid),
            "Submitted" => Some(PaymentStatus::Submitted),
            "Approved" => Some(PaymentStatus::Approved),
            "Rejected" => Some(PaymentStatus::Rejected),
            _ => None,
        }
    }
}

/// What an admin decided about a submitted payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentDecision {
    Approve,
    Reject,
}

impl PaymentDecision {
    pub fn resulting_status(&self) -> PaymentStatus {
        match self {
            PaymentDecision::Approve => PaymentStatus::Approved,
            PaymentDecision::Reject => PaymentStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyPaymentRequest {
    pub note: Option<String>,
}
