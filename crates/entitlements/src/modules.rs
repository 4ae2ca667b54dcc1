use core::str::FromStr;

use serde::{Deserialize, Serialize};

use comptoir_core::DomainError;

/// Back-office module a user may open.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleId {
    Dashboard,
    Sales,
    Customers,
    Inventory,
    Categories,
    Subcategories,
    Movements,
    Services,
    Payments,
    Recovery,
    Users,
    Settings,
    Reports,
    /// Platform console; never part of a tenant plan.
    Superadmin,
}

impl ModuleId {
    pub const ALL: [ModuleId; 14] = [
        ModuleId::Dashboard,
        ModuleId::Sales,
        ModuleId::Customers,
        ModuleId::Inventory,
        ModuleId::Categories,
        ModuleId::Subcategories,
        ModuleId::Movements,
        ModuleId::Services,
        ModuleId::Payments,
        ModuleId::Recovery,
        ModuleId::Users,
        ModuleId::Settings,
        ModuleId::Reports,
        ModuleId::Superadmin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModuleId::Dashboard => "dashboard",
            ModuleId::Sales => "sales",
            ModuleId::Customers => "customers",
            ModuleId::Inventory => "inventory",
            ModuleId::Categories => "categories",
            ModuleId::Subcategories => "subcategories",
            ModuleId::Movements => "movements",
            ModuleId::Services => "services",
            ModuleId::Payments => "payments",
            ModuleId::Recovery => "recovery",
            ModuleId::Users => "users",
            ModuleId::Settings => "settings",
            ModuleId::Reports => "reports",
            ModuleId::Superadmin => "superadmin",
        }
    }

    /// Modules a tenant plan may contain (everything but the platform console).
    pub fn tenant_modules() -> impl Iterator<Item = ModuleId> {
        ModuleId::ALL.into_iter().filter(|m| *m != ModuleId::Superadmin)
    }
}

impl core::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModuleId::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| DomainError::not_found(format!("module '{s}'")))
    }
}
