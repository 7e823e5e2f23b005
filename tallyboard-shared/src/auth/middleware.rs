/// Request authentication for Axum
///
/// [`jwt_auth_middleware`] validates the `Authorization: Bearer <token>`
/// header and stores an [`AuthContext`] in the request extensions. Handlers
/// then take `AuthContext` as an extractor.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Router};
/// use tallyboard_shared::auth::middleware::{jwt_auth_middleware, AuthContext};
///
/// async fn whoami(auth: AuthContext) -> String {
///     format!("user {} in business {}", auth.user_id, auth.business_id)
/// }
///
/// let secret = "a-development-secret-of-32-bytes!!".to_string();
/// let app: Router = Router::new()
///     .route("/whoami", get(whoami))
///     .layer(middleware::from_fn(move |req, next| {
///         jwt_auth_middleware(secret.clone(), req, next)
///     }));
/// ```

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::{validate_access_token, Claims, JwtError};

/// Identity of the caller for the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,

    /// Business selected by the token; role checks still go to the database
    pub business_id: Uuid,
}

impl AuthContext {
    pub fn new(user_id: Uuid, business_id: Uuid) -> Self {
        Self {
            user_id,
            business_id,
        }
    }

    pub fn from_claims(claims: &Claims) -> Self {
        Self::new(claims.sub, claims.business_id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingCredentials,

    #[error("{0}")]
    InvalidFormat(String),

    #[error("{0}")]
    InvalidToken(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            AuthError::MissingCredentials | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            other => AuthError::InvalidToken(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": "unauthorized",
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

/// Pulls the bearer token out of the `Authorization` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))
}

/// Validates the bearer access token in `headers`
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthContext, AuthError> {
    let token = bearer_token(headers)?;
    let claims = validate_access_token(token, secret)?;
    Ok(AuthContext::from_claims(&claims))
}

/// Rejects the request unless it carries a valid access token
pub async fn jwt_auth_middleware(
    secret: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let context = authenticate(req.headers(), &secret)?;
    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or(AuthError::MissingCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{create_token, Claims, TokenType};
    use axum::http::HeaderValue;

    const SECRET: &str = "middleware-test-secret-with-32-bytes!";

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers_with("Bearer abc.def")).unwrap(), "abc.def");
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            bearer_token(&headers_with("Basic dXNlcg==")),
            Err(AuthError::InvalidFormat(_))
        ));
        assert!(bearer_token(&headers_with("Bearer ")).is_err());
    }

    #[test]
    fn test_authenticate_access_token() {
        let user_id = Uuid::new_v4();
        let business_id = Uuid::new_v4();
        let token = create_token(&Claims::new(user_id, business_id, TokenType::Access), SECRET).unwrap();

        let context = authenticate(&headers_with(&format!("Bearer {}", token)), SECRET).unwrap();
        assert_eq!(context, AuthContext::new(user_id, business_id));
    }

    #[test]
    fn test_authenticate_rejects_refresh_token() {
        let token = create_token(
            &Claims::new(Uuid::new_v4(), Uuid::new_v4(), TokenType::Refresh),
            SECRET,
        )
        .unwrap();

        let err = authenticate(&headers_with(&format!("Bearer {}", token)), SECRET).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_auth_error_statuses() {
        assert_eq!(
            AuthError::MissingCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidFormat("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
