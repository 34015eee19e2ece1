//! Domain models for the EventHub backend.
//!
//! This module contains the database-backed records the enrollment core
//! reads and mutates: events (with their seat ledger), users, enrollments
//! and payment transactions.

pub mod enrollment;
pub mod event;
pub mod transaction;
pub mod user;

// Re-export all models for convenient access
pub use enrollment::{Enrollment, EnrollmentStatus, EnrollmentWithEvent, PaymentCapture};
pub use event::{Event, EventStatus, SeatLedger};
pub use transaction::{
    to_minor_units, NewTransaction, Page, Transaction, TransactionFilter, TransactionStatus,
};
pub use user::{User, UserRole, VerificationStatus};
