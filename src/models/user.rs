use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Caller role, as issued by the identity layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Participant,
    Organizer,
    Admin,
}

impl UserRole {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "participant" => Ok(UserRole::Participant),
            "organizer" => Ok(UserRole::Organizer),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Participant => "participant",
            UserRole::Organizer => "organizer",
            UserRole::Admin => "admin",
        }
    }
}

/// Organizer KYC state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

impl VerificationStatus {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(VerificationStatus::Pending),
            "verified" => Ok(VerificationStatus::Verified),
            "rejected" => Ok(VerificationStatus::Rejected),
            _ => Err(format!("Invalid verification status: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
        }
    }
}

/// User model, read-only to the enrollment core
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub verification_status: String,
    pub is_suspended: bool,
    pub created_at: NaiveDateTime,
}

impl User {
    /// Create a new User (typically used for seeding and tests)
    pub fn new(name: String, email: String, role: UserRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            role: role.as_str().to_string(),
            verification_status: VerificationStatus::Pending.as_str().to_string(),
            is_suspended: false,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn role_enum(&self) -> Option<UserRole> {
        UserRole::from_str(&self.role).ok()
    }

    pub fn is_verified(&self) -> bool {
        VerificationStatus::from_str(&self.verification_status).ok()
            == Some(VerificationStatus::Verified)
    }
}
