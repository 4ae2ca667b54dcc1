use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use comptoir_core::CustomerId;
use comptoir_entitlements::ModuleId;

use crate::app::{dto, errors, services::AppServices};
use crate::authz::require_module;
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_customer).get(list_customers))
        .route("/:id", get(get_customer))
}

pub async fn register_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Json(body): Json<dto::RegisterCustomerRequest>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Customers) {
        return res;
    }
    match services.backoffice().customers.register(ctx.session(), body.into()) {
        Ok(customer) => (StatusCode::CREATED, Json(customer)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_customers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Customers) {
        return res;
    }
    match services.backoffice().customers.list(ctx.session()) {
        Ok(customers) => (StatusCode::OK, Json(customers)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn get_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Customers) {
        return res;
    }
    let id: CustomerId = match dto::parse_id(&id, "customer") {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.backoffice().customers.get(ctx.session(), id) {
        Ok(customer) => (StatusCode::OK, Json(customer)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
