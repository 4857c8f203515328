//! Session authentication middleware
//!
//! Resolves each protected request to a user identity from the
//! `session_token` cookie or an `Authorization: Bearer` header and makes it
//! available to handlers as an [`AuthUser`] extension.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use teamtodo_auth::JwtValidator;
use tracing::debug;
use uuid::Uuid;

use crate::models::ErrorResponse;
use crate::{SESSION_COOKIE, TOKEN_ISSUER};

/// Authenticated caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
}

/// JWT validation state shared across middleware instances
#[derive(Clone)]
pub struct JwtState {
    pub validator: Arc<JwtValidator>,
}

impl JwtState {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            validator: Arc::new(JwtValidator::new(secret).with_issuer(TOKEN_ISSUER.to_string())),
        }
    }
}

fn unauthorized(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    let mut body = ErrorResponse::new(message, "UNAUTHORIZED");
    body.kind = Some("AUTHORIZATION".to_string());
    body.remedy = Some("Sign in again".to_string());
    (StatusCode::UNAUTHORIZED, Json(body))
}

/// Cookie first (browsers), then the Authorization header (API clients).
fn extract_token(headers: &HeaderMap) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .map(str::trim)
        .find_map(|c| c.strip_prefix(SESSION_COOKIE).and_then(|c| c.strip_prefix('=')))
        .filter(|t| !t.is_empty());

    if let Some(token) = from_cookie {
        return Ok(token.to_string());
    }

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| unauthorized("Missing session (cookie or Authorization header)"))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| unauthorized("Invalid Authorization header format. Expected 'Bearer <token>'"))
}

/// Reject the request with 401 unless it carries a valid session token.
pub async fn require_auth(
    State(state): State<Arc<JwtState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let token = extract_token(request.headers())?;

    let claims = state.validator.validate(&token).map_err(|e| {
        debug!("Rejected session token: {}", e);
        unauthorized(format!("Invalid or expired session: {}", e))
    })?;

    let user_id = claims
        .user_id()
        .map_err(|e| unauthorized(e.to_string()))?;

    request.extensions_mut().insert(AuthUser {
        user_id,
        email: claims.email,
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, middleware, routing::get, Router};
    use chrono::Duration;
    use teamtodo_auth::SessionClaims;
    use tower::ServiceExt;

    const SECRET: &[u8] = b"test-secret-key";

    async fn whoami(axum::Extension(user): axum::Extension<AuthUser>) -> Json<AuthUser> {
        Json(user)
    }

    fn app() -> Router {
        let jwt_state = Arc::new(JwtState::new(SECRET));

        Router::new()
            .route("/protected", get(whoami))
            .layer(middleware::from_fn_with_state(jwt_state.clone(), require_auth))
            .with_state(jwt_state)
    }

    fn token(user_id: Uuid, validity: Duration) -> String {
        let claims = SessionClaims::new(
            user_id,
            "alice@example.com".to_string(),
            TOKEN_ISSUER.to_string(),
            validity,
        );
        JwtValidator::encode(SECRET, &claims).unwrap()
    }

    async fn error_of(response: Response) -> ErrorResponse {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_bearer_token_accepted() {
        let user_id = Uuid::new_v4();

        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("Authorization", format!("Bearer {}", token(user_id, Duration::hours(1))))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let user: AuthUser = serde_json::from_slice(&body).unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_cookie_token_accepted() {
        let cookie = format!(
            "theme=dark; {}={}",
            SESSION_COOKIE,
            token(Uuid::new_v4(), Duration::hours(1))
        );

        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("Cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_token() {
        let response = app()
            .oneshot(Request::builder().uri("/protected").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let error = error_of(response).await;
        assert_eq!(error.code.as_deref(), Some("UNAUTHORIZED"));
        assert!(error.error.contains("Missing session"));
    }

    #[tokio::test]
    async fn test_invalid_bearer_format() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("Authorization", "Token abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(error_of(response)
            .await
            .error
            .contains("Invalid Authorization header format"));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header(
                        "Authorization",
                        format!("Bearer {}", token(Uuid::new_v4(), Duration::seconds(-60))),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(error_of(response).await.error.contains("Invalid or expired session"));
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret() {
        let claims = SessionClaims::new(
            Uuid::new_v4(),
            "mallory@example.com".to_string(),
            TOKEN_ISSUER.to_string(),
            Duration::hours(1),
        );
        let forged = JwtValidator::encode(b"not-the-secret", &claims).unwrap();

        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("Authorization", format!("Bearer {}", forged))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_session_token_rejected() {
        let claims = SessionClaims::new(
            Uuid::new_v4(),
            "bot@example.com".to_string(),
            TOKEN_ISSUER.to_string(),
            Duration::hours(1),
        )
        .with_token_type("auth".to_string());
        let token = JwtValidator::encode(SECRET, &claims).unwrap();

        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/protected")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(error_of(response).await.error.contains("Invalid token type"));
    }
}
