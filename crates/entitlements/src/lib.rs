//! Entitlements: which modules a session may open, which actions it may
//! perform, and whether plan quotas admit a new resource.
//!
//! Everything here is pure lookup and comparison; no IO and no state beyond
//! the immutable [`PlanCatalog`].

pub mod engine;
pub mod explain;
pub mod modules;
pub mod plans;
pub mod policy;
pub mod resources;
pub mod roles;
pub mod session;
pub mod tenant;

pub use engine::{Decision, DecisionRule, EntitlementEngine};
pub use explain::{explain_module_access, AccessExplanation};
pub use modules::ModuleId;
pub use plans::{Plan, PlanCatalog, PlanId, PlanLimits};
pub use resources::{Action, QuotaResource, Resource};
pub use roles::Role;
pub use session::{validate_claims, Session, SessionClaims, TokenValidationError, User};
pub use tenant::{PaymentStatus, TenantAccount};
