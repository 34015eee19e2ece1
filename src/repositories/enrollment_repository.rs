use crate::error::RepositoryError;
use crate::models::{Enrollment, EnrollmentStatus, EnrollmentWithEvent, PaymentCapture};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Repository for enrollment data access
pub struct EnrollmentRepository {
    pool: PgPool,
}

impl EnrollmentRepository {
    /// Create a new EnrollmentRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Return the enrollment for (participant, event), creating a pending one
    /// if none exists.
    ///
    /// The unique constraint on the pair plus `ON CONFLICT` makes concurrent
    /// first requests converge on a single row.
    pub async fn upsert_pending(
        &self,
        participant_id: Uuid,
        event_id: Uuid,
    ) -> Result<Enrollment, RepositoryError> {
        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"
            INSERT INTO enrollments (participant_id, event_id, status)
            VALUES ($1, $2, $3)
            ON CONFLICT (participant_id, event_id)
            DO UPDATE SET updated_at = enrollments.updated_at
            RETURNING *
            "#,
        )
        .bind(participant_id)
        .bind(event_id)
        .bind(EnrollmentStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(enrollment)
    }

    /// Find an enrollment by UUID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Enrollment>, RepositoryError> {
        let enrollment = sqlx::query_as::<_, Enrollment>("SELECT * FROM enrollments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(enrollment)
    }

    /// A participant's enrollments with the event details, newest first
    pub async fn list_for_participant(
        &self,
        participant_id: Uuid,
    ) -> Result<Vec<EnrollmentWithEvent>, RepositoryError> {
        let rows = sqlx::query_as::<_, EnrollmentWithEvent>(
            r#"
            SELECT en.id, en.event_id, en.status, en.order_id, en.payment_id, en.created_at,
                   e.title AS event_title, e.status AS event_status,
                   e.enrollment_fee, e.capacity, e.enrolled_count
            FROM enrollments en
            JOIN events e ON e.id = en.event_id
            WHERE en.participant_id = $1
            ORDER BY en.created_at DESC
            "#,
        )
        .bind(participant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Paid enrollments of an event, oldest first
    pub async fn list_paid_for_event(&self, event_id: Uuid) -> Result<Vec<Enrollment>, RepositoryError> {
        let rows = sqlx::query_as::<_, Enrollment>(
            r#"
            SELECT * FROM enrollments
            WHERE event_id = $1 AND status = $2
            ORDER BY updated_at ASC
            "#,
        )
        .bind(event_id)
        .bind(EnrollmentStatus::Paid.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

/// Row-lock an enrollment for the rest of the SQL transaction
pub async fn lock_by_id(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<Enrollment>, RepositoryError> {
    let enrollment =
        sqlx::query_as::<_, Enrollment>("SELECT * FROM enrollments WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(enrollment)
}

/// Point a pending enrollment at its latest order
pub async fn set_order(
    conn: &mut PgConnection,
    id: Uuid,
    order_id: Option<&str>,
) -> Result<Option<Enrollment>, RepositoryError> {
    let enrollment = sqlx::query_as::<_, Enrollment>(
        r#"
        UPDATE enrollments
        SET order_id = $2, updated_at = NOW()
        WHERE id = $1 AND status = $3
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(order_id)
    .bind(EnrollmentStatus::Pending.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(enrollment)
}

pub async fn mark_paid(
    conn: &mut PgConnection,
    capture: &PaymentCapture,
) -> Result<Enrollment, RepositoryError> {
    let enrollment = sqlx::query_as::<_, Enrollment>(
        r#"
        UPDATE enrollments
        SET status = $2,
            order_id = COALESCE($3, order_id),
            payment_id = $4,
            payment_signature = $5,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(capture.enrollment_id)
    .bind(EnrollmentStatus::Paid.as_str())
    .bind(capture.order_id.as_deref())
    .bind(capture.payment_id.as_deref())
    .bind(capture.signature.as_deref())
    .fetch_one(&mut *conn)
    .await?;

    Ok(enrollment)
}

pub async fn mark_refunded(conn: &mut PgConnection, id: Uuid) -> Result<Enrollment, RepositoryError> {
    let enrollment = sqlx::query_as::<_, Enrollment>(
        r#"
        UPDATE enrollments
        SET status = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(EnrollmentStatus::Refunded.as_str())
    .fetch_one(&mut *conn)
    .await?;

    Ok(enrollment)
}
