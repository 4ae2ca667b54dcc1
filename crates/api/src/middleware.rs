use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use comptoir_entitlements::{validate_claims, SessionClaims};

use crate::context::SessionContext;

#[derive(Clone)]
pub struct AuthState {
    key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl AuthState {
    /// HS256 verification. The time window is checked by `validate_claims`
    /// because the claims carry RFC 3339 timestamps, not `exp`.
    pub fn hs256(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        Self {
            key: Arc::new(DecodingKey::from_secret(secret)),
            validation: Arc::new(validation),
        }
    }

    fn session_claims(&self, token: &str) -> Result<SessionClaims, StatusCode> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "bearer token rejected");
            StatusCode::UNAUTHORIZED
        })?;
        validate_claims(&data.claims, Utc::now()).map_err(|e| {
            tracing::debug!(error = %e, "session claims rejected");
            StatusCode::UNAUTHORIZED
        })?;
        Ok(data.claims)
    }
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_bearer(req.headers())?;
    let claims = state.session_claims(token)?;

    req.extensions_mut()
        .insert(SessionContext::new(claims.into_session()));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}
