//! Inventory campaigns (`/stock/campaigns`). While one is open every sale
//! and stock mutation of the tenant answers `423 locked`.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use comptoir_entitlements::ModuleId;
use comptoir_inventory::CampaignId;

use crate::app::{dto, errors, services::AppServices};
use crate::authz::require_module;
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(open_campaign).get(list_campaigns))
        .route("/:id/close", post(close_campaign))
}

pub async fn open_campaign(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Json(body): Json<dto::OpenCampaignRequest>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Inventory) {
        return res;
    }
    match services.backoffice().campaigns.open(ctx.session(), &body.label) {
        Ok(campaign) => (StatusCode::CREATED, Json(campaign)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_campaigns(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Inventory) {
        return res;
    }
    match services.backoffice().campaigns.list(ctx.session()) {
        Ok(campaigns) => (StatusCode::OK, Json(campaigns)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn close_campaign(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CloseCampaignRequest>,
) -> axum::response::Response {
    if let Err(res) = require_module(services.engine(), &ctx, ModuleId::Inventory) {
        return res;
    }
    let id: CampaignId = match dto::parse_id(&id, "campaign") {
        Ok(v) => v,
        Err(res) => return res,
    };
    let counts = match body.counts() {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.backoffice().campaigns.close(ctx.session(), id, &counts) {
        Ok(campaign) => (StatusCode::OK, Json(campaign)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
