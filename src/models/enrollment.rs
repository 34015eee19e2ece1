//! Enrollment state machine records

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Enrollment lifecycle.
///
/// `Pending -> Paid` only through the mark-paid primitive;
/// `Paid -> Refunded` only through a refund that releases the seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Pending,
    Paid,
    Cancelled,
    Refunded,
}

impl EnrollmentStatus {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(EnrollmentStatus::Pending),
            "paid" => Ok(EnrollmentStatus::Paid),
            "cancelled" => Ok(EnrollmentStatus::Cancelled),
            "refunded" => Ok(EnrollmentStatus::Refunded),
            _ => Err(format!("Invalid enrollment status: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Paid => "paid",
            EnrollmentStatus::Cancelled => "cancelled",
            EnrollmentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One participant's enrollment in one event
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub event_id: Uuid,
    pub status: String,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    #[serde(skip_serializing)]
    pub payment_signature: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Enrollment {
    /// Create a new pending Enrollment
    pub fn new(participant_id: Uuid, event_id: Uuid) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4(),
            participant_id,
            event_id,
            status: EnrollmentStatus::Pending.as_str().to_string(),
            order_id: None,
            payment_id: None,
            payment_signature: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status_enum(&self) -> Option<EnrollmentStatus> {
        EnrollmentStatus::from_str(&self.status).ok()
    }

    pub fn is_paid(&self) -> bool {
        self.status_enum() == Some(EnrollmentStatus::Paid)
    }

    pub fn is_pending(&self) -> bool {
        self.status_enum() == Some(EnrollmentStatus::Pending)
    }

    pub fn belongs_to(&self, participant_id: Uuid) -> bool {
        self.participant_id == participant_id
    }
}

/// Enrollment joined with the event fields a participant's dashboard needs
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentWithEvent {
    pub id: Uuid,
    pub event_id: Uuid,
    pub status: String,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub event_title: String,
    pub event_status: String,
    pub enrollment_fee: Decimal,
    pub capacity: i32,
    pub enrolled_count: i32,
}

/// Proof of a completed payment handed to the mark-paid primitive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCapture {
    pub enrollment_id: Uuid,
    /// `None` for free enrollments, which never see the gateway
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub signature: Option<String>,
}

impl PaymentCapture {
    /// Capture for a free enrollment
    pub fn free(enrollment_id: Uuid) -> Self {
        Self {
            enrollment_id,
            order_id: None,
            payment_id: None,
            signature: None,
        }
    }
}
