use crate::error::{AppError, AppResult};
use crate::models::{Page, SeatLedger, Transaction, TransactionFilter, TransactionStatus};
use crate::repositories::EnrollmentStore;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;
/// Highest page whose offset still fits in an i64 at the largest page size
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// A paid participant of an event
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub enrollment_id: Uuid,
    pub participant_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub payment_id: Option<String>,
    pub enrolled_at: NaiveDateTime,
}

/// Seat ledger plus whether it reconciles
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatLedgerReport {
    #[serde(flatten)]
    pub ledger: SeatLedger,
    pub consistent: bool,
}

/// Read-only views for organizers and admins
pub struct ReportingService {
    store: Arc<dyn EnrollmentStore>,
}

fn clamp_page(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    (
        page.unwrap_or(1).clamp(1, MAX_PAGE),
        limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
    )
}

impl ReportingService {
    pub fn new(store: Arc<dyn EnrollmentStore>) -> Self {
        Self { store }
    }

    /// An organizer's payment ledger, newest first
    pub async fn organizer_transactions(
        &self,
        organizer_id: Uuid,
        status: Option<TransactionStatus>,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> AppResult<Page<Transaction>> {
        let (page, limit) = clamp_page(page, limit);
        let filter = TransactionFilter {
            organizer_id: Some(organizer_id),
            status,
            page,
            limit,
            ..Default::default()
        };
        Ok(self.store.list_transactions(&filter).await?)
    }

    /// Paid enrollments of an event the organizer owns
    pub async fn attendees(&self, organizer_id: Uuid, event_id: Uuid) -> AppResult<Vec<Attendee>> {
        self.owned_event(event_id, Some(organizer_id)).await?;

        let enrollments = self.store.list_paid_enrollments(event_id).await?;
        let mut attendees = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            let user = self.store.find_user(enrollment.participant_id).await?;
            attendees.push(Attendee {
                enrollment_id: enrollment.id,
                participant_id: enrollment.participant_id,
                name: user.as_ref().map(|u| u.name.clone()),
                email: user.map(|u| u.email),
                payment_id: enrollment.payment_id,
                enrolled_at: enrollment.updated_at,
            });
        }
        Ok(attendees)
    }

    /// Reconcile an event's seat counter; `owner` is `None` for admins
    pub async fn seat_ledger(&self, event_id: Uuid, owner: Option<Uuid>) -> AppResult<SeatLedgerReport> {
        self.owned_event(event_id, owner).await?;

        let ledger = self
            .store
            .seat_ledger(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".into()))?;

        let consistent = ledger.is_consistent();
        if !consistent {
            warn!(
                event_id = %event_id,
                enrolled_count = ledger.enrolled_count,
                paid_enrollments = ledger.paid_enrollments,
                "Seat ledger drift detected"
            );
        }

        Ok(SeatLedgerReport { ledger, consistent })
    }

    /// Platform-wide transaction listing for admins
    pub async fn admin_transactions(
        &self,
        mut filter: TransactionFilter,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> AppResult<Page<Transaction>> {
        if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
            if start > end {
                return Err(AppError::Validation("startDate must not be after endDate".into()));
            }
        }
        (filter.page, filter.limit) = clamp_page(page, limit);
        Ok(self.store.list_transactions(&filter).await?)
    }

    async fn owned_event(&self, event_id: Uuid, owner: Option<Uuid>) -> AppResult<()> {
        let event = self
            .store
            .find_event(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".into()))?;

        match owner {
            Some(organizer_id) if event.organizer_id != organizer_id => {
                Err(AppError::NotFound("Event not found".into()))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_page() {
        assert_eq!(clamp_page(None, None), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(clamp_page(Some(0), Some(1000)), (1, MAX_PAGE_SIZE));
        assert_eq!(clamp_page(Some(3), Some(0)), (3, 1));
        assert_eq!(clamp_page(Some(i64::MAX), Some(50)), (MAX_PAGE, 50));
        assert_eq!(clamp_page(Some(i64::MIN), None), (1, DEFAULT_PAGE_SIZE));
    }
}
