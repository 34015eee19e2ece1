//! Identity extractors.
//!
//! Handlers declare the role they need by taking one of these as a
//! parameter; the request never reaches the handler otherwise.

use super::error::ApiError;
use crate::auth::{self, Claims};
use crate::error::AppError;
use crate::models::{User, UserRole};
use crate::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

/// Any authenticated, non-suspended user
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub claims: Claims,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

        let token = auth::extract_bearer(header)?;
        let claims = auth::verify_token(&state.auth.token_secret, token, state.auth.token_ttl_secs)?;

        let user = state
            .store
            .find_user(claims.user_id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::Unauthorized("Unknown user".into()))?;

        if user.is_suspended {
            return Err(AppError::Forbidden("Account suspended".into()).into());
        }

        // Tokens outlive role changes; the stored role wins
        if user.role_enum() != Some(claims.role) {
            return Err(AppError::Unauthorized("Token role no longer valid".into()).into());
        }

        Ok(Self { user, claims })
    }
}

async fn require_role(parts: &mut Parts, state: &AppState, role: UserRole) -> Result<User, ApiError> {
    let AuthUser { user, claims } = AuthUser::from_request_parts(parts, state).await?;
    if claims.role != role {
        return Err(AppError::Forbidden(format!("{} role required", role.as_str())).into());
    }
    Ok(user)
}

/// Caller must be a participant
#[derive(Debug, Clone)]
pub struct RequireParticipant(pub User);

#[async_trait]
impl FromRequestParts<AppState> for RequireParticipant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        require_role(parts, state, UserRole::Participant).await.map(Self)
    }
}

/// Caller must be a verified organizer
#[derive(Debug, Clone)]
pub struct RequireOrganizer(pub User);

#[async_trait]
impl FromRequestParts<AppState> for RequireOrganizer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = require_role(parts, state, UserRole::Organizer).await?;
        if !user.is_verified() {
            return Err(AppError::Forbidden("Organizer verification required".into()).into());
        }
        Ok(Self(user))
    }
}

#[derive(Debug, Clone)]
pub struct RequireAdmin(pub User);

#[async_trait]
impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        require_role(parts, state, UserRole::Admin).await.map(Self)
    }
}
