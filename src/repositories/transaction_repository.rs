use crate::error::RepositoryError;
use crate::models::{NewTransaction, Page, Transaction, TransactionFilter, TransactionStatus};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

/// Repository for the payment transaction ledger
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    /// Create a new TransactionRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a transaction by UUID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>, RepositoryError> {
        let tx = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tx)
    }

    /// Find the transaction opened for a gateway order
    pub async fn find_by_order(&self, order_id: &str) -> Result<Option<Transaction>, RepositoryError> {
        let tx = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tx)
    }

    /// Filtered, paginated listing, newest first
    pub async fn list(&self, filter: &TransactionFilter) -> Result<Page<Transaction>, RepositoryError> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM transactions WHERE 1 = 1");
        push_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut list_query = QueryBuilder::<Postgres>::new("SELECT * FROM transactions WHERE 1 = 1");
        push_filters(&mut list_query, filter);
        list_query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset());

        let data = list_query
            .build_query_as::<Transaction>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            data,
            page: filter.page.max(1),
            limit: filter.limit,
            total,
        })
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &TransactionFilter) {
    if let Some(event_id) = filter.event_id {
        query.push(" AND event_id = ").push_bind(event_id);
    }
    if let Some(organizer_id) = filter.organizer_id {
        query.push(" AND organizer_id = ").push_bind(organizer_id);
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(start) = filter.start_date {
        query.push(" AND created_at >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        query.push(" AND created_at <= ").push_bind(end);
    }
}

/// Open a `created` transaction row
pub async fn insert(conn: &mut PgConnection, new: &NewTransaction) -> Result<Transaction, RepositoryError> {
    let tx = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions
            (participant_id, organizer_id, event_id, enrollment_id, amount, currency, status, order_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(new.participant_id)
    .bind(new.organizer_id)
    .bind(new.event_id)
    .bind(new.enrollment_id)
    .bind(new.amount)
    .bind(&new.currency)
    .bind(TransactionStatus::Created.as_str())
    .bind(new.order_id.as_deref())
    .fetch_one(&mut *conn)
    .await?;

    Ok(tx)
}

/// Lock the open transaction a capture settles.
///
/// Free captures carry no order id and match the newest open zero-order row.
pub async fn lock_open_for_capture(
    conn: &mut PgConnection,
    enrollment_id: Uuid,
    order_id: Option<&str>,
) -> Result<Option<Transaction>, RepositoryError> {
    let tx = sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE enrollment_id = $1
          AND order_id IS NOT DISTINCT FROM $2
          AND status = $3
        ORDER BY created_at DESC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(enrollment_id)
    .bind(order_id)
    .bind(TransactionStatus::Created.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(tx)
}

pub async fn lock_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Transaction>, RepositoryError> {
    let tx = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(tx)
}

/// Move a transaction to a terminal capture state, recording the payment id
pub async fn settle(
    conn: &mut PgConnection,
    id: Uuid,
    status: TransactionStatus,
    payment_id: Option<&str>,
) -> Result<Transaction, RepositoryError> {
    let tx = sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET status = $2, payment_id = COALESCE($3, payment_id), updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(payment_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(tx)
}

pub async fn mark_refunded(
    conn: &mut PgConnection,
    id: Uuid,
    refund_id: &str,
) -> Result<Transaction, RepositoryError> {
    let tx = sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET status = $2, refund_id = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(TransactionStatus::Refunded.as_str())
    .bind(refund_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(tx)
}
