// Authentication middleware for protected routes
// Accepts a bearer JWT or an opaque API key and resolves an active user

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::models::User;

const API_KEY_HEADER: &str = "x-api-key";

/// The authenticated user resolved for this request. Handlers read it from
/// request extensions via the extractor below.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // Bearer token first, API key as fallback
    if let Some(token) = bearer_token(request.headers()) {
        match resolve_token_user(&state, &token).await {
            Some(user) => {
                request.extensions_mut().insert(CurrentUser(user));
                return next.run(request).await;
            }
            None => return unauthorized(),
        }
    }

    if let Some(key) = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(user) = resolve_api_key_user(&state, key).await {
            request.extensions_mut().insert(CurrentUser(user));
            return next.run(request).await;
        }
    }

    unauthorized()
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

async fn resolve_token_user(state: &AppState, token: &str) -> Option<User> {
    let claims = state.jwt_service.validate_token(token).ok()?;
    let user_id = Uuid::parse_str(&claims.sub).ok()?;

    let mut conn = state.diesel_pool.get().await.ok()?;
    User::find_active_by_id(&mut conn, user_id).await.ok()
}

async fn resolve_api_key_user(state: &AppState, key: &str) -> Option<User> {
    let mut conn = state.diesel_pool.get().await.ok()?;
    User::find_active_by_api_key(&mut conn, key).await.ok()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "Unauthorized" })),
    )
        .into_response()
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn non_bearer_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic foo"));
        assert_eq!(bearer_token(&headers), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
