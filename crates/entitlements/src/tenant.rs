use serde::{Deserialize, Serialize};

use comptoir_core::TenantId;

use crate::PlanId;

/// Billing standing of a tenant, owned by an external billing collaborator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    UpToDate,
    Trial,
    Late,
    Inactive,
}

impl PaymentStatus {
    /// `UP_TO_DATE` and `TRIAL` unlock the plan; anything else restricts access.
    pub fn is_in_good_standing(self) -> bool {
        matches!(self, PaymentStatus::UpToDate | PaymentStatus::Trial)
    }
}

/// The tenant as seen by the entitlement engine (read-only here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantAccount {
    pub id: TenantId,
    pub payment_status: PaymentStatus,
    pub plan_id: PlanId,
}
