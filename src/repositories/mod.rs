pub mod enrollment_repository;
pub mod event_repository;
pub mod memory_store;
pub mod pg_store;
pub mod store;
pub mod transaction_repository;
pub mod user_repository;

// Re-export all repositories for convenient access
pub use enrollment_repository::EnrollmentRepository;
pub use event_repository::EventRepository;
pub use memory_store::InMemoryEnrollmentStore;
pub use pg_store::PgEnrollmentStore;
pub use store::{EnrollmentStore, PaidTransition, RefundCompletion};
pub use transaction_repository::TransactionRepository;
pub use user_repository::UserRepository;
