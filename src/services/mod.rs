pub mod audit;
pub mod enrollment_service;
pub mod notifier;
pub mod refund_service;
pub mod reporting_service;
pub mod verification_service;

pub use audit::{AuditTrailService, CaptureSource};
pub use enrollment_service::{EnrollmentResult, EnrollmentService};
pub use notifier::Notifier;
pub use refund_service::RefundService;
pub use reporting_service::{Attendee, ReportingService, SeatLedgerReport};
pub use verification_service::{
    VerificationResult, VerificationService, WebhookAck, WebhookOutcome,
};
