//! Billable services catalogue (`/services`).

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use comptoir_entitlements::ModuleId;

use crate::app::{dto, errors, services::AppServices};
use crate::authz::require_module;
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new().route("/", post(register_service).get(list_services))
}

pub async fn register_service(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Json(body): Json<dto::RegisterServiceRequest>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Services) {
        return res;
    }
    match services.backoffice().services.register(ctx.session(), body.into()) {
        Ok(service) => (StatusCode::CREATED, Json(service)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_services(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Services) {
        return res;
    }
    match services.backoffice().services.list(ctx.session()) {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
