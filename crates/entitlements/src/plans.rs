use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{ModuleId, QuotaResource};

/// Subscription plan identifier (`BASIC`, `STANDARD`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(String);

impl PlanId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for PlanId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlanId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Numeric quotas of a plan.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub max_customers: u64,
    pub max_users: u64,
    pub max_monthly_sales: u64,
}

impl PlanLimits {
    pub fn limit_for(&self, quota: QuotaResource) -> u64 {
        match quota {
            QuotaResource::Customers => self.max_customers,
            QuotaResource::Users => self.max_users,
            QuotaResource::MonthlySales => self.max_monthly_sales,
        }
    }
}

/// Immutable plan definition. `limits: None` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub allowed_modules: BTreeSet<ModuleId>,
    #[serde(default)]
    pub limits: Option<PlanLimits>,
}

impl Plan {
    pub fn allows_module(&self, module: ModuleId) -> bool {
        self.allowed_modules.contains(&module)
    }

    /// Remaining headroom check: `current_count < limit`, always true when unlimited.
    pub fn admits(&self, quota: QuotaResource, current_count: u64) -> bool {
        match &self.limits {
            None => true,
            Some(limits) => current_count < limits.limit_for(quota),
        }
    }
}

/// Lookup table from plan id to plan. Serialized as a JSON array of plans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Plan>", into = "Vec<Plan>")]
pub struct PlanCatalog {
    plans: BTreeMap<PlanId, Plan>,
}

impl From<Vec<Plan>> for PlanCatalog {
    fn from(plans: Vec<Plan>) -> Self {
        Self {
            plans: plans.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }
}

impl From<PlanCatalog> for Vec<Plan> {
    fn from(catalog: PlanCatalog) -> Self {
        catalog.plans.into_values().collect()
    }
}

impl PlanCatalog {
    pub fn get(&self, id: &PlanId) -> Option<&Plan> {
        self.plans.get(id)
    }

    pub fn plans(&self) -> impl Iterator<Item = &Plan> {
        self.plans.values()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

const BASIC_MODULES: &[ModuleId] = &[
    ModuleId::Dashboard,
    ModuleId::Sales,
    ModuleId::Customers,
    ModuleId::Inventory,
    ModuleId::Movements,
    ModuleId::Services,
    ModuleId::Categories,
    ModuleId::Subcategories,
    ModuleId::Payments,
];

const STANDARD_EXTRA_MODULES: &[ModuleId] = &[
    ModuleId::Recovery,
    ModuleId::Users,
    ModuleId::Settings,
    ModuleId::Reports,
];

impl Default for PlanCatalog {
    /// Built-in BASIC / STANDARD / PREMIUM tiers.
    fn default() -> Self {
        let basic: BTreeSet<ModuleId> = BASIC_MODULES.iter().copied().collect();
        let standard: BTreeSet<ModuleId> = basic
            .iter()
            .chain(STANDARD_EXTRA_MODULES)
            .copied()
            .collect();

        vec![
            Plan {
                id: PlanId::new("BASIC"),
                allowed_modules: basic,
                limits: Some(PlanLimits {
                    max_customers: 5,
                    max_users: 2,
                    max_monthly_sales: 20,
                }),
            },
            Plan {
                id: PlanId::new("STANDARD"),
                allowed_modules: standard,
                limits: Some(PlanLimits {
                    max_customers: 100,
                    max_users: 5,
                    max_monthly_sales: 500,
                }),
            },
            Plan {
                id: PlanId::new("PREMIUM"),
                allowed_modules: ModuleId::tenant_modules().collect(),
                limits: None,
            },
        ]
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_has_three_tiers() {
        let catalog = PlanCatalog::default();
        let basic = catalog.get(&PlanId::new("BASIC")).unwrap();
        assert!(basic.allows_module(ModuleId::Sales));
        assert!(!basic.allows_module(ModuleId::Recovery));

        let premium = catalog.get(&PlanId::new("PREMIUM")).unwrap();
        assert!(premium.limits.is_none());
        assert!(!premium.allows_module(ModuleId::Superadmin));
    }

    #[test]
    fn catalog_loads_from_json_array() {
        let json = r#"[
            {"id": "TINY", "allowed_modules": ["dashboard", "sales"],
             "limits": {"max_customers": 1, "max_users": 1, "max_monthly_sales": 3}},
            {"id": "OPEN", "allowed_modules": ["dashboard"]}
        ]"#;
        let catalog = PlanCatalog::from_json(json).unwrap();

        let tiny = catalog.get(&"TINY".into()).unwrap();
        assert!(tiny.admits(QuotaResource::MonthlySales, 2));
        assert!(!tiny.admits(QuotaResource::MonthlySales, 3));

        let open = catalog.get(&"OPEN".into()).unwrap();
        assert!(open.admits(QuotaResource::Customers, u64::MAX - 1));
    }
}
