use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Event status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
}

impl EventStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(EventStatus::Draft),
            "published" => Ok(EventStatus::Published),
            "cancelled" => Ok(EventStatus::Cancelled),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Published => "published",
            EventStatus::Cancelled => "cancelled",
        }
    }
}

impl From<EventStatus> for String {
    fn from(status: EventStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Event as seen by the enrollment core.
///
/// `enrolled_count` is the seat ledger: it only moves through the
/// conditional increment/decrement in the enrollment store, never through
/// organizer edits.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub capacity: i32,
    pub enrolled_count: i32,
    pub enrollment_fee: Decimal,
    pub status: String, // Stored as TEXT, use EventStatus enum for type safety
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Event {
    /// Create a new draft Event
    pub fn new(organizer_id: Uuid, title: String, capacity: i32, enrollment_fee: Decimal) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4(),
            organizer_id,
            title,
            capacity,
            enrolled_count: 0,
            enrollment_fee,
            status: EventStatus::Draft.as_str().to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Get status as an enum
    pub fn status_enum(&self) -> Option<EventStatus> {
        EventStatus::from_str(&self.status).ok()
    }

    /// Only published events accept enrollments
    pub fn is_published(&self) -> bool {
        self.status_enum() == Some(EventStatus::Published)
    }

    /// Free events skip the payment gateway entirely
    pub fn is_free(&self) -> bool {
        self.enrollment_fee.is_zero()
    }

    pub fn seats_remaining(&self) -> i32 {
        (self.capacity - self.enrolled_count).max(0)
    }

    pub fn is_full(&self) -> bool {
        self.enrolled_count >= self.capacity
    }
}

/// Seat ledger reconciliation for one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatLedger {
    pub event_id: Uuid,
    pub capacity: i32,
    pub enrolled_count: i32,
    pub paid_enrollments: i64,
}

impl SeatLedger {
    /// True when the counter matches the paid enrollments and respects capacity
    pub fn is_consistent(&self) -> bool {
        i64::from(self.enrolled_count) == self.paid_enrollments
            && self.enrolled_count <= self.capacity
            && self.enrolled_count >= 0
    }
}
