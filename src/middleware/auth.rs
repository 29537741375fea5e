//! Authentication middleware

use axum::{
    extract::{State, Request},
    middleware::Next,
    response::Response,
    http::header::AUTHORIZATION,
};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{AppState, AppError};

/// JWT claims issued by the auth service
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,      // Username
    pub role: String,     // User role
    pub exp: usize,       // Expiration timestamp
}

/// Hospital staff roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Admin,
    /// Biomedical engineer (`biomedical` or `biomedicalengineer`)
    Biomedical,
    Technician,
    Other(String),
}

impl Role {
    pub fn parse(role: &str) -> Self {
        match role.trim().to_lowercase().as_str() {
            "admin" => Role::Admin,
            "biomedical" | "biomedicalengineer" => Role::Biomedical,
            "technician" => Role::Technician,
            other => Role::Other(other.to_string()),
        }
    }
}

/// User context extracted from JWT
#[derive(Debug, Clone)]
pub struct UserContext {
    pub username: String,
    pub role: Role,
}

impl UserContext {
    /// Check if user has admin role
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// RBAC: Require admin role
pub fn require_admin(user: &UserContext) -> Result<(), AppError> {
    if !user.is_admin() {
        tracing::warn!("Admin required but user {} has role {:?}", user.username, user.role);
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// RBAC: Require one of the given roles
pub fn require_any_role(user: &UserContext, allowed: &[Role]) -> Result<(), AppError> {
    if !allowed.contains(&user.role) {
        tracing::warn!(
            "Roles {:?} required but user {} has role {:?}",
            allowed, user.username, user.role
        );
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Middleware: Require user JWT authentication
pub async fn require_user_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&req)?;

    let claims = decode_claims(&token, &state.config.jwt_secret)?;

    let user_ctx = UserContext {
        username: claims.sub,
        role: Role::parse(&claims.role),
    };

    // Insert into request extensions
    req.extensions_mut().insert(user_ctx);

    Ok(next.run(req).await)
}

/// Decode and validate an HS256 token
pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default()
    )?;
    Ok(token_data.claims)
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(req: &Request) -> Result<String, AppError> {
    let auth_header = req.headers()
        .get(AUTHORIZATION)
        .ok_or(AppError::Unauthorized)?
        .to_str()
        .map_err(|_| AppError::Unauthorized)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(|t| t.to_string())
        .ok_or(AppError::Unauthorized)
}

// Implement FromRequestParts for UserContext
#[axum::async_trait]
impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions
            .get::<UserContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
