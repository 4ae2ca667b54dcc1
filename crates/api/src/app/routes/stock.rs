use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use comptoir_entitlements::ModuleId;
use comptoir_infra::projections::{MovementQuery, Page};
use comptoir_inventory::StockItemId;

use crate::app::{dto, errors, services::AppServices};
use crate::authz::require_module;
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_stock_item).get(list_stock))
        .route("/movements", post(post_movement).get(list_movements))
        .route("/movements/bulk-in", post(bulk_receive))
        .route("/movements/stats", get(movement_stats))
        .route("/:id/movements", get(item_movements))
}

pub async fn create_stock_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Json(body): Json<dto::CreateStockItemRequest>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Inventory) {
        return res;
    }
    match services
        .backoffice()
        .stock
        .create_item(ctx.session(), &body.name, body.sku.as_deref())
    {
        Ok(level) => (StatusCode::CREATED, Json(level)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Inventory) {
        return res;
    }
    match services.backoffice().stock.levels(ctx.session()) {
        Ok(levels) => (StatusCode::OK, Json(levels)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn post_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Json(body): Json<dto::PostMovementRequest>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Movements) {
        return res;
    }
    let request = match body.into_request() {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.backoffice().stock.post_movement(ctx.session(), request) {
        Ok(movement) => (StatusCode::CREATED, Json(movement)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn bulk_receive(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Json(body): Json<dto::BulkReceiveRequest>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Movements) {
        return res;
    }
    let lines = match body.lines() {
        Ok(l) => l,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.backoffice().stock.bulk_receive(
        ctx.session(),
        &lines,
        &body.reason,
        body.reference.as_deref(),
    ) {
        Ok(movements) => (StatusCode::CREATED, Json(movements)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Query(params): Query<dto::MovementsQueryParams>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Movements) {
        return res;
    }
    let stock_item_id = match params.stock_item_id.as_deref() {
        Some(raw) => match dto::parse_id::<StockItemId>(raw, "stock item") {
            Ok(id) => Some(id),
            Err(res) => return res,
        },
        None => None,
    };
    let query = MovementQuery {
        stock_item_id,
        from: params.from,
        to: params.to,
        page: Page::new(
            params.offset.unwrap_or(0),
            params.limit.unwrap_or(Page::DEFAULT_LIMIT),
        ),
    };
    match services.backoffice().stock.movements_in_range(ctx.session(), &query) {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn movement_stats(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Query(params): Query<dto::MovementsQueryParams>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Movements) {
        return res;
    }
    match services
        .backoffice()
        .stock
        .daily_stats(ctx.session(), params.from, params.to)
    {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn item_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Movements) {
        return res;
    }
    let id: StockItemId = match dto::parse_id(&id, "stock item") {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.backoffice().stock.movement_history(ctx.session(), id) {
        Ok(movements) => (StatusCode::OK, Json(movements)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
