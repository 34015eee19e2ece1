use crate::error::RepositoryError;
use crate::models::{Event, EventStatus, SeatLedger};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Repository for event data access.
///
/// Event metadata belongs to the CRUD layer; this repository only creates
/// events for seeding and owns the seat ledger writes.
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    /// Create a new EventRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new event
    pub async fn create(
        &self,
        organizer_id: Uuid,
        title: &str,
        capacity: i32,
        enrollment_fee: Decimal,
        status: EventStatus,
    ) -> Result<Event, RepositoryError> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (organizer_id, title, capacity, enrollment_fee, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(organizer_id)
        .bind(title)
        .bind(capacity)
        .bind(enrollment_fee)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    /// Find an event by UUID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>, RepositoryError> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(event)
    }

    /// Compare the seat counter with the paid enrollments it should mirror
    pub async fn seat_ledger(&self, id: Uuid) -> Result<Option<SeatLedger>, RepositoryError> {
        let row: Option<(Uuid, i32, i32, i64)> = sqlx::query_as(
            r#"
            SELECT e.id, e.capacity, e.enrolled_count,
                   (SELECT COUNT(*) FROM enrollments en
                     WHERE en.event_id = e.id AND en.status = 'paid') AS paid_enrollments
            FROM events e
            WHERE e.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(event_id, capacity, enrolled_count, paid_enrollments)| SeatLedger {
            event_id,
            capacity,
            enrolled_count,
            paid_enrollments,
        }))
    }
}

/// Consume one seat if, and only if, one is left.
///
/// Returns `None` when the event is full; the check and the increment are a
/// single statement so concurrent callers can never overbook.
pub async fn try_take_seat(
    conn: &mut PgConnection,
    event_id: Uuid,
) -> Result<Option<Event>, RepositoryError> {
    let event = sqlx::query_as::<_, Event>(
        r#"
        UPDATE events
        SET enrolled_count = enrolled_count + 1, updated_at = NOW()
        WHERE id = $1 AND enrolled_count < capacity
        RETURNING *
        "#,
    )
    .bind(event_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(event)
}

/// Give a seat back; never drops the counter below zero
pub async fn release_seat(
    conn: &mut PgConnection,
    event_id: Uuid,
) -> Result<Option<Event>, RepositoryError> {
    let event = sqlx::query_as::<_, Event>(
        r#"
        UPDATE events
        SET enrolled_count = enrolled_count - 1, updated_at = NOW()
        WHERE id = $1 AND enrolled_count > 0
        RETURNING *
        "#,
    )
    .bind(event_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(event)
}
