use crate::api::error::AppError;
use crate::utils::auth::{CurrentUser, Role, validate_jwt};
use crate::{AppState, entities::prelude::Users};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sea_orm::EntityTrait;

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Validates the bearer token and attaches the caller as `CurrentUser`.
/// The role is taken from the database row, not from the token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let unauthorized = || AppError::Unauthorized("authorization required".to_string());

    let token = bearer_token(&req).ok_or_else(unauthorized)?;
    let claims = validate_jwt(token, &state.config.jwt_secret).map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        unauthorized()
    })?;

    let user = Users::find_by_id(claims.sub.clone())
        .one(&state.db)
        .await?
        .ok_or_else(unauthorized)?;

    let role: Role = user
        .role
        .parse()
        .map_err(|e: anyhow::Error| AppError::Internal(e.to_string()))?;

    req.extensions_mut().insert(CurrentUser { id: user.id, role });
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Lets only admins through. Must run after `auth_middleware`.
pub async fn admin_guard(req: Request, next: Next) -> Result<Response, AppError> {
    let user = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| AppError::Unauthorized("authorization required".to_string()))?;

    if user.role != Role::Admin {
        tracing::warn!("User {} denied admin access", user.id);
        return Err(AppError::Forbidden("access denied".to_string()));
    }

    Ok(next.run(req).await)
}
