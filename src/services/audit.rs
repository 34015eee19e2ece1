use crate::error::{AppError, AppResult};
use crate::models::{Enrollment, Transaction};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Where a capture came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSource {
    /// Client checkout callback
    Client,
    /// Gateway webhook
    Webhook,
    /// Zero-fee enrollment, no gateway involved
    Free,
}

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: i64,
    pub event_type: String, // "order_created", "payment_captured", "refund_completed", etc.
    pub event_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub details: serde_json::Value,
}

/// Append-only JSONL trail of every money-moving decision
pub struct AuditTrailService {
    log_file: PathBuf,
    file_handle: Arc<Mutex<std::fs::File>>,
}

impl AuditTrailService {
    /// Create a new audit trail service
    pub fn new(log_directory: impl AsRef<Path>) -> AppResult<Self> {
        let log_directory = log_directory.as_ref();
        std::fs::create_dir_all(log_directory)
            .map_err(|e| AppError::Message(format!("Failed to create log directory: {}", e)))?;

        // One file per day
        let date = chrono::Utc::now().format("%Y-%m-%d");
        let log_file = log_directory.join(format!("audit_{}.log", date));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .map_err(|e| AppError::Message(format!("Failed to open audit log file: {}", e)))?;

        info!("Audit trail initialized: {:?}", log_file);

        Ok(Self {
            log_file,
            file_handle: Arc::new(Mutex::new(file)),
        })
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Log an audit entry
    pub async fn log(&self, entry: AuditLogEntry) -> AppResult<()> {
        let json = serde_json::to_string(&entry)?;

        let mut file = self.file_handle.lock().await;
        writeln!(file, "{}", json)
            .map_err(|e| AppError::Message(format!("Failed to write audit log: {}", e)))?;

        file.flush()
            .map_err(|e| AppError::Message(format!("Failed to flush audit log: {}", e)))?;

        Ok(())
    }

    /// Best-effort write; a broken audit file must not fail a payment flow
    async fn record(&self, entry: AuditLogEntry) {
        if let Err(e) = self.log(entry).await {
            warn!("Audit write failed: {}", e);
        }
    }

    /// Log a new order attempt
    pub async fn log_order_created(&self, enrollment: &Enrollment, transaction: &Transaction) {
        self.record(AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "order_created".to_string(),
            event_id: Some(enrollment.event_id),
            actor_id: Some(enrollment.participant_id),
            details: serde_json::json!({
                "enrollment_id": enrollment.id,
                "transaction_id": transaction.id,
                "order_id": transaction.order_id,
                "amount": transaction.amount.to_string(),
                "currency": transaction.currency,
            }),
        })
        .await
    }

    /// Log the pending -> paid transition
    pub async fn log_payment_captured(
        &self,
        enrollment: &Enrollment,
        transaction: &Transaction,
        source: CaptureSource,
    ) {
        self.record(AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "payment_captured".to_string(),
            event_id: Some(enrollment.event_id),
            actor_id: Some(enrollment.participant_id),
            details: serde_json::json!({
                "enrollment_id": enrollment.id,
                "transaction_id": transaction.id,
                "order_id": transaction.order_id,
                "payment_id": transaction.payment_id,
                "amount": transaction.amount.to_string(),
                "source": source,
            }),
        })
        .await
    }

    /// Log money captured for an event that had no seat left
    pub async fn log_seats_exhausted(&self, enrollment: &Enrollment, transaction: &Transaction) {
        self.record(AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "capture_without_seat".to_string(),
            event_id: Some(enrollment.event_id),
            actor_id: Some(enrollment.participant_id),
            details: serde_json::json!({
                "enrollment_id": enrollment.id,
                "transaction_id": transaction.id,
                "payment_id": transaction.payment_id,
                "amount": transaction.amount.to_string(),
            }),
        })
        .await
    }

    /// Log a refund issued by an organizer
    pub async fn log_refund_completed(
        &self,
        transaction: &Transaction,
        organizer_id: Uuid,
        seat_released: bool,
    ) {
        self.record(AuditLogEntry {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: "refund_completed".to_string(),
            event_id: Some(transaction.event_id),
            actor_id: Some(organizer_id),
            details: serde_json::json!({
                "transaction_id": transaction.id,
                "enrollment_id": transaction.enrollment_id,
                "payment_id": transaction.payment_id,
                "refund_id": transaction.refund_id,
                "amount": transaction.amount.to_string(),
                "seat_released": seat_released,
            }),
        })
        .await
    }
}
