//! Module gate applied by handlers before calling the engines.
//!
//! Action/resource checks happen inside the services; this only answers
//! "may this session open the module the route belongs to".

use axum::{http::StatusCode, response::Response};

use comptoir_entitlements::{explain_module_access, EntitlementEngine, ModuleId};

use crate::app::errors;
use crate::context::SessionContext;

pub fn require_module(
    engine: &EntitlementEngine,
    ctx: &SessionContext,
    module: ModuleId,
) -> Result<(), Response> {
    require_any_module(engine, ctx, &[module])
}

/// Passes when the session may open at least one of `modules`. A denial
/// is explained against the first one.
pub fn require_any_module(
    engine: &EntitlementEngine,
    ctx: &SessionContext,
    modules: &[ModuleId],
) -> Result<(), Response> {
    if modules.iter().any(|&m| engine.can_access_module(ctx.session(), m)) {
        return Ok(());
    }
    let module = modules.first().copied().unwrap_or(ModuleId::Dashboard);
    let explanation = explain_module_access(engine, ctx.session(), module);
    tracing::warn!(
        tenant_id = %ctx.tenant_id(),
        user_id = %ctx.session().user_id(),
        module = %module,
        rule = ?explanation.rule,
        "module access denied"
    );
    Err(errors::json_error(StatusCode::FORBIDDEN, "forbidden", explanation.reason))
}
