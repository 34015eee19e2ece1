//! Transaction ledger models for money movement

use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Transaction lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Created,
    Paid,
    Refunded,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "paid" => Some(Self::Paid),
            "refunded" => Some(Self::Refunded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Durable record of one payment attempt
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub organizer_id: Uuid,
    pub event_id: Uuid,
    pub enrollment_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub refund_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Transaction {
    pub fn status_enum(&self) -> Option<TransactionStatus> {
        TransactionStatus::from_str(&self.status)
    }

    pub fn is_paid(&self) -> bool {
        self.status_enum() == Some(TransactionStatus::Paid)
    }

    pub fn is_open(&self) -> bool {
        self.status_enum() == Some(TransactionStatus::Created)
    }

    /// Money was captured for this attempt and not yet returned.
    ///
    /// A failed attempt counts when the gateway still captured a payment,
    /// which happens when the seat was gone at capture time.
    pub fn is_refundable(&self) -> bool {
        match self.status_enum() {
            Some(TransactionStatus::Paid) => true,
            Some(TransactionStatus::Failed) => self.payment_id.as_deref().map_or(false, |p| !p.is_empty()),
            _ => false,
        }
    }
}

/// Fields needed to open a transaction row
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub participant_id: Uuid,
    pub organizer_id: Uuid,
    pub event_id: Uuid,
    pub enrollment_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub order_id: Option<String>,
}

impl NewTransaction {
    pub fn into_transaction(self) -> Transaction {
        let now = chrono::Utc::now().naive_utc();
        Transaction {
            id: Uuid::new_v4(),
            participant_id: self.participant_id,
            organizer_id: self.organizer_id,
            event_id: self.event_id,
            enrollment_id: self.enrollment_id,
            amount: self.amount,
            currency: self.currency,
            status: TransactionStatus::Created.as_str().to_string(),
            order_id: self.order_id,
            payment_id: None,
            refund_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Admin/organizer listing filter
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub event_id: Option<Uuid>,
    pub organizer_id: Option<Uuid>,
    pub status: Option<TransactionStatus>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub page: i64,
    pub limit: i64,
}

impl TransactionFilter {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit.max(0))
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        self.event_id.map_or(true, |id| tx.event_id == id)
            && self.organizer_id.map_or(true, |id| tx.organizer_id == id)
            && self.status.map_or(true, |s| tx.status == s.as_str())
            && self.start_date.map_or(true, |d| tx.created_at >= d)
            && self.end_date.map_or(true, |d| tx.created_at <= d)
    }
}

/// One page of a listing plus the unpaginated total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

/// Convert a major-unit amount (rupees) to gateway minor units (paise).
///
/// Rounds half away from zero, matching how fees are displayed.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    if amount.is_sign_negative() {
        return None;
    }
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units_conversion() {
        assert_eq!(to_minor_units(Decimal::new(49900, 2)), Some(49900));
        assert_eq!(to_minor_units(Decimal::new(250, 0)), Some(25000));
        assert_eq!(to_minor_units(Decimal::new(1005, 3)), Some(101));
        assert_eq!(to_minor_units(Decimal::ZERO), Some(0));
        assert_eq!(to_minor_units(Decimal::new(-1, 0)), None);
    }

    #[test]
    fn test_filter_offset_clamps_page() {
        let filter = TransactionFilter {
            page: 0,
            limit: 20,
            ..Default::default()
        };
        assert_eq!(filter.offset(), 0);

        let filter = TransactionFilter {
            page: 3,
            limit: 20,
            ..Default::default()
        };
        assert_eq!(filter.offset(), 40);

        let filter = TransactionFilter {
            page: i64::MAX,
            limit: 100,
            ..Default::default()
        };
        assert_eq!(filter.offset(), i64::MAX);
    }

    #[test]
    fn test_failed_capture_is_refundable() {
        let mut tx = NewTransaction {
            participant_id: Uuid::new_v4(),
            organizer_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            enrollment_id: Uuid::new_v4(),
            amount: Decimal::new(500, 0),
            currency: "INR".into(),
            order_id: Some("order_1".into()),
        }
        .into_transaction();
        assert!(!tx.is_refundable());

        tx.status = TransactionStatus::Failed.as_str().to_string();
        assert!(!tx.is_refundable());

        tx.payment_id = Some("pay_1".into());
        assert!(tx.is_refundable());

        tx.status = TransactionStatus::Refunded.as_str().to_string();
        assert!(!tx.is_refundable());
    }

    #[test]
    fn test_new_transaction_opens_as_created() {
        let tx = NewTransaction {
            participant_id: Uuid::new_v4(),
            organizer_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            enrollment_id: Uuid::new_v4(),
            amount: Decimal::new(500, 0),
            currency: "INR".into(),
            order_id: Some("order_1".into()),
        }
        .into_transaction();
        assert!(tx.is_open());
        assert!(!tx.is_paid());
    }
}
