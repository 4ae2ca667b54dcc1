//! Stateless entitlement decisions.
//!
//! Every call is re-evaluated from the session and, for quotas, the count the
//! caller supplies. Nothing is cached; the only state is the immutable plan
//! catalog.

use serde::Serialize;
use tracing::debug;

use crate::policy::{role_grant, role_modules};
use crate::{Action, ModuleId, Plan, PlanCatalog, Resource, Session};

/// The rule that settled a decision.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRule {
    /// User belongs to another tenant than the session tenant.
    TenantMismatch,
    /// Tenant is `LATE`/`INACTIVE`; only the restricted fallback applies.
    PaymentStatus,
    /// `SUPER_ADMIN` only ever reaches the platform console.
    SuperAdmin,
    /// Session references a plan absent from the catalog.
    UnknownPlan,
    /// The plan does not include the module.
    NotInPlan,
    /// The plan quota for the resource is reached.
    QuotaReached,
    /// `ADMIN` holds everything the plan allows.
    Admin,
    /// One of the user's roles grants it.
    RoleGrant,
    /// No role grants it.
    NoGrant,
}

/// An access decision together with the rule that produced it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub rule: DecisionRule,
}

impl Decision {
    fn allow(rule: DecisionRule) -> Self {
        Self { allowed: true, rule }
    }

    fn deny(rule: DecisionRule) -> Self {
        Self { allowed: false, rule }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntitlementEngine {
    catalog: PlanCatalog,
}

impl EntitlementEngine {
    pub fn new(catalog: PlanCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub fn plan_of(&self, session: &Session) -> Option<&Plan> {
        self.catalog.get(&session.tenant.plan_id)
    }

    pub fn can_access_module(&self, session: &Session, module: ModuleId) -> bool {
        self.decide_module(session, module).allowed
    }

    /// Modules the session may open, in catalog order.
    pub fn accessible_modules(&self, session: &Session) -> Vec<ModuleId> {
        ModuleId::ALL
            .into_iter()
            .filter(|m| self.can_access_module(session, *m))
            .collect()
    }

    pub fn decide_module(&self, session: &Session, module: ModuleId) -> Decision {
        let user = &session.user;

        if !user.is_super_admin() && user.tenant_id != session.tenant.id {
            return Decision::deny(DecisionRule::TenantMismatch);
        }

        if !session.tenant.payment_status.is_in_good_standing() {
            let allowed = if user.is_super_admin() {
                module == ModuleId::Superadmin
            } else {
                user.is_admin() && module == ModuleId::Dashboard
            };
            return Decision { allowed, rule: DecisionRule::PaymentStatus };
        }

        if user.is_super_admin() {
            return Decision {
                allowed: module == ModuleId::Superadmin,
                rule: DecisionRule::SuperAdmin,
            };
        }

        let Some(plan) = self.plan_of(session) else {
            debug!(plan_id = %session.tenant.plan_id, "unknown plan, denying module access");
            return Decision::deny(DecisionRule::UnknownPlan);
        };
        if !plan.allows_module(module) {
            return Decision::deny(DecisionRule::NotInPlan);
        }

        if user.is_admin() {
            return Decision::allow(DecisionRule::Admin);
        }

        if user.roles.iter().any(|r| role_modules(*r).contains(&module)) {
            Decision::allow(DecisionRule::RoleGrant)
        } else {
            Decision::deny(DecisionRule::NoGrant)
        }
    }

    /// Whether `action` on `resource` is permitted.
    ///
    /// `current_count` is the caller's current count for the resource's quota;
    /// it only matters for `CREATE` on a quota-bearing resource. When it is
    /// `None` the quota step is skipped and left to the caller's reservation.
    pub fn can_perform(
        &self,
        session: &Session,
        action: Action,
        resource: Resource,
        current_count: Option<u64>,
    ) -> bool {
        self.decide_action(session, action, resource, current_count).allowed
    }

    pub fn decide_action(
        &self,
        session: &Session,
        action: Action,
        resource: Resource,
        current_count: Option<u64>,
    ) -> Decision {
        let user = &session.user;

        if !user.is_super_admin() && user.tenant_id != session.tenant.id {
            return Decision::deny(DecisionRule::TenantMismatch);
        }
        if user.is_super_admin() {
            return Decision::allow(DecisionRule::SuperAdmin);
        }
        if user.is_admin() {
            return Decision::allow(DecisionRule::Admin);
        }

        let Some(plan) = self.plan_of(session) else {
            return Decision::deny(DecisionRule::UnknownPlan);
        };

        if action == Action::Create {
            if let (Some(quota), Some(count)) = (resource.quota(), current_count) {
                if !plan.admits(quota, count) {
                    return Decision::deny(DecisionRule::QuotaReached);
                }
            }
        }

        let granted = user
            .roles
            .iter()
            .filter_map(|r| role_grant(*r))
            .any(|g| g.allows(action, resource));
        if granted {
            Decision::allow(DecisionRule::RoleGrant)
        } else {
            Decision::deny(DecisionRule::NoGrant)
        }
    }

    /// Pure quota comparison: unlimited plans always admit, otherwise
    /// `current_count < limit`. Resources without a quota are always admitted.
    pub fn is_creation_allowed(&self, session: &Session, resource: Resource, current_count: u64) -> bool {
        let Some(plan) = self.plan_of(session) else {
            return false;
        };
        match resource.quota() {
            Some(quota) => plan.admits(quota, current_count),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use comptoir_core::{TenantId, UserId};

    use super::*;
    use crate::{PaymentStatus, PlanId, Role, TenantAccount, User};

    fn session(roles: &[Role], status: PaymentStatus, plan: &str) -> Session {
        let tenant_id = TenantId::new();
        Session {
            user: User {
                id: UserId::new(),
                tenant_id,
                roles: roles.iter().copied().collect(),
            },
            tenant: TenantAccount {
                id: tenant_id,
                payment_status: status,
                plan_id: PlanId::new(plan),
            },
        }
    }

    fn engine() -> EntitlementEngine {
        EntitlementEngine::new(PlanCatalog::default())
    }

    #[test]
    fn late_admin_only_sees_dashboard() {
        let s = session(&[Role::Admin], PaymentStatus::Late, "PREMIUM");
        let modules = engine().accessible_modules(&s);
        assert_eq!(modules, vec![ModuleId::Dashboard]);
    }

    #[test]
    fn inactive_tenant_denies_other_roles_everything() {
        let s = session(&[Role::Accountant, Role::Sales], PaymentStatus::Inactive, "PREMIUM");
        assert!(engine().accessible_modules(&s).is_empty());
    }

    #[test]
    fn super_admin_is_restricted_to_console_even_when_late() {
        let e = engine();
        for status in [PaymentStatus::UpToDate, PaymentStatus::Late] {
            let s = session(&[Role::SuperAdmin, Role::Admin], status, "PREMIUM");
            assert_eq!(e.accessible_modules(&s), vec![ModuleId::Superadmin]);
        }
    }

    #[test]
    fn module_must_be_in_plan_even_for_admin() {
        let s = session(&[Role::Admin], PaymentStatus::UpToDate, "BASIC");
        let e = engine();
        assert!(e.can_access_module(&s, ModuleId::Sales));
        assert!(!e.can_access_module(&s, ModuleId::Recovery));
        assert_eq!(e.decide_module(&s, ModuleId::Recovery).rule, DecisionRule::NotInPlan);
    }

    #[test]
    fn roles_union_their_module_lists() {
        let s = session(&[Role::Sales, Role::Employee], PaymentStatus::Trial, "PREMIUM");
        let e = engine();
        assert!(e.can_access_module(&s, ModuleId::Sales));
        assert!(e.can_access_module(&s, ModuleId::Customers));
        assert!(!e.can_access_module(&s, ModuleId::Movements));
        assert!(!e.can_access_module(&s, ModuleId::Superadmin));
    }

    #[test]
    fn default_is_deny() {
        let e = engine();
        let no_roles = session(&[], PaymentStatus::UpToDate, "PREMIUM");
        assert!(e.accessible_modules(&no_roles).is_empty());
        assert!(!e.can_perform(&no_roles, Action::View, Resource::Sales, None));

        let unknown_plan = session(&[Role::Admin], PaymentStatus::UpToDate, "GOLD");
        assert!(!e.can_access_module(&unknown_plan, ModuleId::Dashboard));
        assert!(!e.is_creation_allowed(&unknown_plan, Resource::Customers, 0));
    }

    #[test]
    fn foreign_user_is_denied() {
        let mut s = session(&[Role::Admin], PaymentStatus::UpToDate, "PREMIUM");
        s.user.tenant_id = TenantId::new();
        let e = engine();
        assert!(!e.can_access_module(&s, ModuleId::Dashboard));
        assert!(!e.can_perform(&s, Action::View, Resource::Sales, None));
    }

    #[test]
    fn basic_plan_customer_quota() {
        let s = session(&[Role::Admin], PaymentStatus::UpToDate, "BASIC");
        let e = engine();
        assert!(!e.is_creation_allowed(&s, Resource::Customers, 5));
        assert!(e.is_creation_allowed(&s, Resource::Customers, 4));
        assert!(e.is_creation_allowed(&s, Resource::Inventory, 10_000));
    }

    #[test]
    fn premium_plan_is_unlimited() {
        let s = session(&[Role::Employee], PaymentStatus::UpToDate, "PREMIUM");
        assert!(engine().is_creation_allowed(&s, Resource::Sales, u64::MAX - 1));
    }

    #[test]
    fn can_perform_checks_quota_then_role_table() {
        let e = engine();
        let employee = session(&[Role::Employee], PaymentStatus::UpToDate, "BASIC");
        assert!(e.can_perform(&employee, Action::Create, Resource::Customers, Some(4)));
        let d = e.decide_action(&employee, Action::Create, Resource::Customers, Some(5));
        assert_eq!(d, Decision { allowed: false, rule: DecisionRule::QuotaReached });
        assert!(!e.can_perform(&employee, Action::Create, Resource::Sales, Some(0)));

        let admin = session(&[Role::Admin], PaymentStatus::UpToDate, "BASIC");
        assert!(e.can_perform(&admin, Action::Delete, Resource::Users, Some(99)));
    }

    #[test]
    fn accountant_may_view_stock_but_not_post_movements() {
        let e = engine();
        let s = session(&[Role::Accountant], PaymentStatus::UpToDate, "STANDARD");
        assert!(e.can_perform(&s, Action::View, Resource::Movements, None));
        assert!(!e.can_perform(&s, Action::Create, Resource::Movements, None));
        assert!(e.can_perform(&s, Action::Edit, Resource::Sales, None));
    }

    mod props {
        use proptest::prelude::*;

        use super::*;

        fn any_status() -> impl Strategy<Value = PaymentStatus> {
            prop_oneof![
                Just(PaymentStatus::UpToDate),
                Just(PaymentStatus::Trial),
                Just(PaymentStatus::Late),
                Just(PaymentStatus::Inactive),
            ]
        }

        fn any_roles() -> impl Strategy<Value = Vec<Role>> {
            proptest::sample::subsequence(Role::ALL.to_vec(), 0..=Role::ALL.len())
        }

        fn any_plan() -> impl Strategy<Value = &'static str> {
            prop_oneof![Just("BASIC"), Just("STANDARD"), Just("PREMIUM"), Just("GOLD")]
        }

        proptest! {
            #[test]
            fn console_is_reserved_to_super_admin(
                roles in any_roles(),
                status in any_status(),
                plan in any_plan(),
            ) {
                let s = session(&roles, status, plan);
                let modules = engine().accessible_modules(&s);
                if s.user.is_super_admin() {
                    prop_assert!(modules.iter().all(|m| *m == ModuleId::Superadmin));
                } else {
                    prop_assert!(!modules.contains(&ModuleId::Superadmin));
                }
            }

            #[test]
            fn unpaid_tenants_get_at_most_the_dashboard(
                roles in any_roles(),
                plan in any_plan(),
                late in any::<bool>(),
            ) {
                let status = if late { PaymentStatus::Late } else { PaymentStatus::Inactive };
                let s = session(&roles, status, plan);
                let modules = engine().accessible_modules(&s);
                prop_assert!(modules.len() <= 1);
            }
        }
    }
}
