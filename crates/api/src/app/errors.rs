use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use comptoir_core::{DomainError, ErrorKind};
use comptoir_infra::DispatchError;

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::QuotaExceeded => StatusCode::PAYMENT_REQUIRED,
        ErrorKind::InvalidState | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Locked => StatusCode::LOCKED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Validation | ErrorKind::InvalidId => StatusCode::BAD_REQUEST,
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let kind = err.kind();
    json_error(status_for(kind), kind.as_str(), err.to_string())
}

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Domain(e) => domain_error_to_response(e),
        DispatchError::TenantIsolation(msg) => {
            tracing::error!(%msg, "tenant isolation violation");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "tenant_isolation", msg)
        }
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        DispatchError::Publish(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "publish_error", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn invalid_id(what: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_domain_kind_has_a_client_status() {
        let cases = [
            (DomainError::forbidden("x"), 403),
            (DomainError::quota_exceeded("x"), 402),
            (DomainError::invalid_state("x"), 409),
            (DomainError::locked("x"), 423),
            (DomainError::not_found("x"), 404),
            (DomainError::validation("x"), 400),
            (DomainError::conflict("x"), 409),
            (DomainError::invalid_id("x"), 400),
        ];
        for (err, status) in cases {
            assert_eq!(domain_error_to_response(err).status().as_u16(), status);
        }
    }

    #[test]
    fn infrastructure_failures_are_server_errors() {
        let res = dispatch_error_to_response(DispatchError::Publish("bus down".into()));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
