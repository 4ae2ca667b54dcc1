use serde::{Deserialize, Serialize};

/// Kind of operation requested on a resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Create,
    Edit,
    Delete,
    View,
}

impl Action {
    pub fn is_mutation(self) -> bool {
        !matches!(self, Action::View)
    }
}

/// Resource an action targets.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Sales,
    Payments,
    Customers,
    Users,
    Inventory,
    Movements,
    Campaigns,
    Categories,
    Subcategories,
    Services,
    Recovery,
    Settings,
    Reports,
}

/// Plan quota a resource is counted against.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaResource {
    Customers,
    Users,
    MonthlySales,
}

impl Resource {
    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Sales => "sales",
            Resource::Payments => "payments",
            Resource::Customers => "customers",
            Resource::Users => "users",
            Resource::Inventory => "inventory",
            Resource::Movements => "movements",
            Resource::Campaigns => "campaigns",
            Resource::Categories => "categories",
            Resource::Subcategories => "subcategories",
            Resource::Services => "services",
            Resource::Recovery => "recovery",
            Resource::Settings => "settings",
            Resource::Reports => "reports",
        }
    }

    /// Quota this resource consumes on creation, if any.
    pub fn quota(self) -> Option<QuotaResource> {
        match self {
            Resource::Customers => Some(QuotaResource::Customers),
            Resource::Users => Some(QuotaResource::Users),
            Resource::Sales => Some(QuotaResource::MonthlySales),
            _ => None,
        }
    }
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl QuotaResource {
    pub fn as_str(self) -> &'static str {
        match self {
            QuotaResource::Customers => "customers",
            QuotaResource::Users => "users",
            QuotaResource::MonthlySales => "monthly_sales",
        }
    }
}
