//! Organizer and admin routes
use super::error::ApiError;
use super::extract::{RequireAdmin, RequireOrganizer};
use crate::error::{AppError, AppResult};
use crate::models::{Page, Transaction, TransactionFilter, TransactionStatus};
use crate::services::{Attendee, SeatLedgerReport};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct PaymentsQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminTransactionsQuery {
    pub event_id: Option<Uuid>,
    pub organizer_id: Option<Uuid>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AttendeeList {
    pub data: Vec<Attendee>,
}

fn parse_status(status: Option<&str>) -> AppResult<Option<TransactionStatus>> {
    status
        .filter(|s| !s.is_empty())
        .map(|s| {
            TransactionStatus::from_str(&s.to_lowercase())
                .ok_or_else(|| AppError::Validation(format!("Invalid status: {}", s)))
        })
        .transpose()
}

/// Accepts RFC 3339 timestamps or bare dates; a bare end date covers the whole day
fn parse_date_bound(value: Option<&str>, end_of_day: bool) -> AppResult<Option<NaiveDateTime>> {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(ts.naive_utc()));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("Invalid date: {}", value)))?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(Some)
        .ok_or_else(|| AppError::Validation(format!("Invalid date: {}", value)))
}

/// `POST /organizer/payments/:transaction_id/refund`
pub async fn refund_transaction(
    State(state): State<AppState>,
    RequireOrganizer(user): RequireOrganizer,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<Transaction>, ApiError> {
    let transaction = state
        .refunds
        .refund_transaction(transaction_id, user.id)
        .await
        .map_err(ApiError::for_operator)?;
    Ok(Json(transaction))
}

/// `GET /organizer/payments`
pub async fn organizer_payments(
    State(state): State<AppState>,
    RequireOrganizer(user): RequireOrganizer,
    Query(query): Query<PaymentsQuery>,
) -> Result<Json<Page<Transaction>>, ApiError> {
    let status = parse_status(query.status.as_deref()).map_err(ApiError::for_operator)?;
    let page = state
        .reporting
        .organizer_transactions(user.id, status, query.page, query.limit)
        .await
        .map_err(ApiError::for_operator)?;
    Ok(Json(page))
}

/// `GET /organizer/events/:id/attendees`
pub async fn event_attendees(
    State(state): State<AppState>,
    RequireOrganizer(user): RequireOrganizer,
    Path(event_id): Path<Uuid>,
) -> Result<Json<AttendeeList>, ApiError> {
    let data = state
        .reporting
        .attendees(user.id, event_id)
        .await
        .map_err(ApiError::for_operator)?;
    Ok(Json(AttendeeList { data }))
}

/// `GET /organizer/events/:id/seat-ledger`
pub async fn organizer_seat_ledger(
    State(state): State<AppState>,
    RequireOrganizer(user): RequireOrganizer,
    Path(event_id): Path<Uuid>,
) -> Result<Json<SeatLedgerReport>, ApiError> {
    let report = state
        .reporting
        .seat_ledger(event_id, Some(user.id))
        .await
        .map_err(ApiError::for_operator)?;
    Ok(Json(report))
}

/// `GET /admin/transactions`
pub async fn admin_transactions(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<AdminTransactionsQuery>,
) -> Result<Json<Page<Transaction>>, ApiError> {
    let filter = TransactionFilter {
        event_id: query.event_id,
        organizer_id: query.organizer_id,
        status: parse_status(query.status.as_deref()).map_err(ApiError::for_operator)?,
        start_date: parse_date_bound(query.start_date.as_deref(), false)
            .map_err(ApiError::for_operator)?,
        end_date: parse_date_bound(query.end_date.as_deref(), true)
            .map_err(ApiError::for_operator)?,
        ..Default::default()
    };

    let page = state
        .reporting
        .admin_transactions(filter, query.page, query.limit)
        .await
        .map_err(ApiError::for_operator)?;
    Ok(Json(page))
}

/// `GET /admin/events/:id/seat-ledger`
pub async fn admin_seat_ledger(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(event_id): Path<Uuid>,
) -> Result<Json<SeatLedgerReport>, ApiError> {
    let report = state
        .reporting
        .seat_ledger(event_id, None)
        .await
        .map_err(ApiError::for_operator)?;
    Ok(Json(report))
}
