use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use comptoir_entitlements::ModuleId;
use comptoir_infra::services::NewSale;
use comptoir_sales::SaleId;

use crate::app::{dto, errors, services::AppServices};
use crate::authz::{require_any_module, require_module};
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_sale).get(list_sales))
        .route("/:id", get(get_sale).put(edit_sale))
        .route("/:id/payments", post(record_payment))
        .route("/:id/delivery", post(record_delivery))
        .route("/:id/cancel", post(cancel_sale))
}

/// Payment collection belongs to the payments module as much as to sales.
const PAYMENT_MODULES: &[ModuleId] = &[ModuleId::Payments, ModuleId::Sales];

fn sale_id(raw: &str) -> Result<SaleId, axum::response::Response> {
    dto::parse_id(raw, "sale")
}

pub async fn create_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Json(body): Json<dto::CreateSaleRequest>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Sales) {
        return res;
    }
    let customer_id = match dto::parse_customer(body.customer_id.as_deref()) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let initial_payment = body.initial_payment();
    let sale = NewSale {
        customer_id,
        lines: body.items.into_iter().map(Into::into).collect(),
        initial_payment,
    };

    match services.backoffice().sales.create_sale(ctx.session(), sale) {
        Ok(summary) => (StatusCode::CREATED, Json(summary)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Sales) {
        return res;
    }
    match services.backoffice().sales.list(ctx.session()) {
        Ok(sales) => (StatusCode::OK, Json(sales)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = require_any_module(services.engine(), &ctx, PAYMENT_MODULES) {
        return res;
    }
    let id = match sale_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.backoffice().sales.get(ctx.session(), id) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn edit_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::EditSaleRequest>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Sales) {
        return res;
    }
    let id = match sale_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let customer_id = match dto::parse_customer(body.customer_id.as_deref()) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let lines = body.items.into_iter().map(Into::into).collect();

    match services.backoffice().sales.edit_sale(ctx.session(), id, customer_id, lines) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> axum::response::Response {
    if let Err(res) = require_any_module(services.engine(), &ctx, PAYMENT_MODULES) {
        return res;
    }
    let id = match sale_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.backoffice().sales.record_payment(ctx.session(), id, body.into()) {
        Ok(summary) => (StatusCode::CREATED, Json(summary)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn record_delivery(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordDeliveryRequest>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Sales) {
        return res;
    }
    let id = match sale_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.backoffice().sales.record_delivery(ctx.session(), id, body.deliveries()) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn cancel_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CancelSaleRequest>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Sales) {
        return res;
    }
    let id = match sale_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let returns = body.returns();
    match services.backoffice().sales.cancel_sale(ctx.session(), id, &body.reason, returns) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Outstanding balances per customer (`GET /recovery`).
pub async fn recovery(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Recovery) {
        return res;
    }
    match services.backoffice().sales.recovery(ctx.session()) {
        Ok(lines) => (StatusCode::OK, Json(lines)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
