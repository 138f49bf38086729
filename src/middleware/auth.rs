use crate::{auth::verify_jwt, error::AppError, notification::Viewer, state::AppState};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Identity facts carried through request extensions once the bearer token
/// has been verified.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub group: String,
    pub role: String,
}

impl AuthContext {
    pub fn viewer(&self) -> Viewer {
        Viewer {
            user_id: self.user_id,
            group: self.group.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized("Invalid credentials".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized("Invalid credentials".to_string()))?;

    let claims = verify_jwt(token, &state.config.jwt_secret)?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

    req.extensions_mut().insert(AuthContext {
        user_id,
        group: claims.group,
        role: claims.role,
    });

    Ok(next.run(req).await)
}

/// Role check for the admin surface. The role claim is authoritative; this
/// service owns no user records.
pub async fn require_admin(
    AuthUser(ctx): AuthUser,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if !ctx.is_admin() {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(req).await)
}

// Extractor for getting the verified identity from request extensions
pub struct AuthUser(pub AuthContext);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::Unauthorized("Invalid credentials".to_string()))
    }
}
