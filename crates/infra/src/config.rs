//! Engine configuration shared by every tenant of a deployment.

use serde::{Deserialize, Serialize};

use comptoir_core::TaxRate;
use comptoir_entitlements::PlanCatalog;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tax applied once over a sale's subtotal, in basis points (1800 = 18%).
    pub tax_rate_bps: u32,
    pub plan_catalog: PlanCatalog,
}

impl EngineConfig {
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tax_rate_bps: TaxRate::STANDARD.bps(),
            plan_catalog: PlanCatalog::default(),
        }
    }
}
