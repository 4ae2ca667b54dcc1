//! Human-readable explanations of entitlement decisions.

use serde::Serialize;

use comptoir_core::{TenantId, UserId};

use crate::engine::{Decision, DecisionRule};
use crate::{EntitlementEngine, ModuleId, PaymentStatus, PlanId, Session};

/// Snapshot of the session a decision was taken for.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub user_id: UserId,
    pub user_tenant_id: TenantId,
    pub tenant_id: TenantId,
    pub roles: Vec<String>,
    pub payment_status: PaymentStatus,
    pub plan_id: PlanId,
}

impl From<&Session> for SessionState {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user.id,
            user_tenant_id: session.user.tenant_id,
            tenant_id: session.tenant.id,
            roles: session.user.roles.iter().map(|r| r.as_str().to_string()).collect(),
            payment_status: session.tenant.payment_status,
            plan_id: session.tenant.plan_id.clone(),
        }
    }
}

/// Why a module was (or would be) opened or refused.
#[derive(Debug, Clone, Serialize)]
pub struct AccessExplanation {
    pub module: ModuleId,
    pub granted: bool,
    pub rule: DecisionRule,
    pub reason: String,
    pub session: SessionState,
}

pub fn explain_module_access(
    engine: &EntitlementEngine,
    session: &Session,
    module: ModuleId,
) -> AccessExplanation {
    let Decision { allowed, rule } = engine.decide_module(session, module);
    AccessExplanation {
        module,
        granted: allowed,
        rule,
        reason: reason_for(session, module, allowed, rule),
        session: SessionState::from(session),
    }
}

fn reason_for(session: &Session, module: ModuleId, allowed: bool, rule: DecisionRule) -> String {
    match rule {
        DecisionRule::TenantMismatch => format!(
            "user belongs to tenant {} but the session targets tenant {}",
            session.user.tenant_id, session.tenant.id
        ),
        DecisionRule::PaymentStatus if allowed => format!(
            "tenant payment status is {:?}; '{module}' stays reachable",
            session.tenant.payment_status
        ),
        DecisionRule::PaymentStatus => format!(
            "tenant payment status is {:?}; access is restricted until billing is settled",
            session.tenant.payment_status
        ),
        DecisionRule::SuperAdmin if allowed => "platform console of SUPER_ADMIN".to_string(),
        DecisionRule::SuperAdmin => format!("SUPER_ADMIN cannot open tenant module '{module}'"),
        DecisionRule::UnknownPlan => format!("plan '{}' is not in the catalog", session.tenant.plan_id),
        DecisionRule::NotInPlan => format!(
            "plan '{}' does not include module '{module}'",
            session.tenant.plan_id
        ),
        DecisionRule::QuotaReached => format!("plan '{}' quota reached", session.tenant.plan_id),
        DecisionRule::Admin => "ADMIN may open every module of the plan".to_string(),
        DecisionRule::RoleGrant => {
            let roles: Vec<&str> = session.user.roles.iter().map(|r| r.as_str()).collect();
            format!("module '{module}' granted by role(s) {}", roles.join(", "))
        }
        DecisionRule::NoGrant => format!("no role of the user grants module '{module}'"),
    }
}
