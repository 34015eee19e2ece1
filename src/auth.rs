use crate::error::{AppError, AppResult};
use crate::models::UserRole;
use crate::signature;
use uuid::Uuid;

/// Identity carried by a verified bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claims {
    pub user_id: Uuid,
    pub role: UserRole,
    pub issued_at: i64,
}

/// Create the message a token signs
///
/// # Arguments
/// * `user_id` - The user the token identifies
/// * `role` - The role the identity layer granted
/// * `issued_at` - Unix timestamp
pub fn create_token_message(user_id: Uuid, role: UserRole, issued_at: i64) -> String {
    format!("{}.{}.{}", user_id, role.as_str(), issued_at)
}

/// Issue a bearer token of the form `<user_id>.<role>.<issued_at>.<hex hmac>`
pub fn issue_token(secret: &str, user_id: Uuid, role: UserRole, issued_at: i64) -> String {
    let message = create_token_message(user_id, role, issued_at);
    let mac = signature::sign(secret, message.as_bytes());
    format!("{}.{}", message, mac)
}

/// Verify a bearer token and return its claims
///
/// Checks that:
/// 1. The token has four dot-separated parts with a valid user id and role
/// 2. The HMAC matches
/// 3. The token is younger than `ttl_secs`
pub fn verify_token(secret: &str, token: &str, ttl_secs: i64) -> AppResult<Claims> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    let [user_id, role, issued_at, mac] = parts.as_slice() else {
        return Err(AppError::Unauthorized("Malformed token".to_string()));
    };

    let user_id = Uuid::parse_str(user_id)
        .map_err(|_| AppError::Unauthorized("Malformed token".to_string()))?;
    let role = UserRole::from_str(role).map_err(AppError::Unauthorized)?;
    let issued_at: i64 = issued_at
        .parse()
        .map_err(|_| AppError::Unauthorized("Malformed token".to_string()))?;

    let message = create_token_message(user_id, role, issued_at);
    if !signature::verify(secret, message.as_bytes(), mac) {
        return Err(AppError::Unauthorized("Invalid token".to_string()));
    }

    let now = chrono::Utc::now().timestamp();
    if now - issued_at > ttl_secs || issued_at - now > 60 {
        return Err(AppError::Unauthorized("Token expired".to_string()));
    }

    Ok(Claims {
        user_id,
        role,
        issued_at,
    })
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn extract_bearer(header: &str) -> AppResult<&str> {
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .unwrap_or_default();

    if token.is_empty() {
        return Err(AppError::Unauthorized("Missing bearer token".to_string()));
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_token_secret_value";

    #[test]
    fn test_create_token_message() {
        let id = Uuid::nil();
        let message = create_token_message(id, UserRole::Organizer, 1234567890);

        assert!(message.contains("organizer"));
        assert!(message.ends_with("1234567890"));
    }

    #[test]
    fn test_issued_token_verifies() {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now().timestamp();
        let token = issue_token(SECRET, id, UserRole::Participant, now);

        let claims = verify_token(SECRET, &token, 3600).unwrap();
        assert_eq!(claims.user_id, id);
        assert_eq!(claims.role, UserRole::Participant);
    }

    #[test]
    fn test_tampered_role_is_rejected() {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now().timestamp();
        let token = issue_token(SECRET, id, UserRole::Participant, now);
        let forged = token.replacen("participant", "admin", 1);

        assert!(verify_token(SECRET, &forged, 3600).is_err());
        assert!(verify_token("another_secret_value", &token, 3600).is_err());
    }

    #[test]
    fn test_verify_token_expired() {
        let old_timestamp = chrono::Utc::now().timestamp() - 400; // 400 seconds ago
        let token = issue_token(SECRET, Uuid::new_v4(), UserRole::Admin, old_timestamp);

        let result = verify_token(SECRET, &token, 300);
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc").unwrap(), "abc");
        assert!(extract_bearer("Basic abc").is_err());
        assert!(extract_bearer("Bearer ").is_err());
    }
}
