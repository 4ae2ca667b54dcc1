use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use comptoir_entitlements::{explain_module_access, ModuleId};

use crate::app::{dto, services::AppServices};
use crate::context::SessionContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// The modules this session may open, plus who the session is.
pub async fn my_access(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
) -> axum::response::Response {
    let session = ctx.session();
    let modules = services.engine().accessible_modules(session);
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "tenant_id": ctx.tenant_id().to_string(),
            "user_id": session.user_id().to_string(),
            "roles": session.user.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
            "payment_status": session.tenant.payment_status,
            "plan_id": session.tenant.plan_id,
            "modules": modules,
        })),
    )
        .into_response()
}

pub async fn explain_access(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<SessionContext>,
    Path(module): Path<String>,
) -> axum::response::Response {
    let module: ModuleId = match dto::parse_id(&module, "module") {
        Ok(m) => m,
        Err(res) => return res,
    };
    let explanation = explain_module_access(services.engine(), ctx.session(), module);
    (StatusCode::OK, Json(explanation)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_is_ok() {
        assert_eq!(health().await, StatusCode::OK);
    }

    #[test]
    fn unknown_module_is_an_invalid_id() {
        let res = dto::parse_id::<ModuleId>("warehouse", "module").unwrap_err();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
