//! Authentication middleware
//!
//! Tokens are issued by the checklist backend; this service only verifies
//! them with the shared `JWT_SECRET`. Backend tokens identify the user as
//! `id` and carry no role or expiry, so `role` and `exp` are optional here.

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

/// Roles allowed to read prediction history.
/// "supervisior" is the spelling stored by the user schema.
pub const HISTORY_ROLES: [&str; 3] = ["admin", "supervisor", "supervisior"];

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(alias = "id")]
    pub sub: String,      // User ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<usize>,
    #[serde(default)]
    pub iat: usize,       // Issued at
}

/// User context extracted from JWT
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: String,
    pub role: Option<String>,
}

/// RBAC: Require one of the given roles
pub fn require_role(user: &UserContext, allowed: &[&str]) -> Result<(), AppError> {
    let permitted = user.role.as_deref().is_some_and(|role| allowed.contains(&role));
    if !permitted {
        tracing::warn!(
            "One of {:?} required but user {} has role {:?}",
            allowed, user.user_id, user.role
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

    // Backend tokens carry only `id` and `iat`; `exp` is checked when present
    let mut validation = Validation::default();
    validation.required_spec_claims.clear();

    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &validation
    )?;

    let claims = token_data.claims;

    let user_ctx = UserContext {
        user_id: claims.sub,
        role: claims.role,
    };

    req.extensions_mut().insert(user_ctx);

    Ok(next.run(req).await)
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
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized)
}

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

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str) -> UserContext {
        UserContext { user_id: "u1".to_string(), role: Some(role.to_string()) }
    }

    #[test]
    fn test_require_role() {
        assert!(require_role(&user("admin"), &HISTORY_ROLES).is_ok());
        assert!(require_role(&user("supervisior"), &HISTORY_ROLES).is_ok());
        assert!(matches!(
            require_role(&user("operator"), &HISTORY_ROLES),
            Err(AppError::Forbidden)
        ));

        let no_role = UserContext { user_id: "u1".to_string(), role: None };
        assert!(matches!(require_role(&no_role, &HISTORY_ROLES), Err(AppError::Forbidden)));
    }

    #[test]
    fn test_backend_claims_shape() {
        let claims: Claims =
            serde_json::from_value(serde_json::json!({"id": "65f0c0ffee", "iat": 1700000000}))
                .unwrap();
        assert_eq!(claims.sub, "65f0c0ffee");
        assert_eq!(claims.role, None);
        assert_eq!(claims.exp, None);
        assert_eq!(claims.iat, 1700000000);
    }
}
