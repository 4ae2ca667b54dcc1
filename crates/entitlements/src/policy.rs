//! Static role tables.
//!
//! These are lookup data: the engine never branches on a role name outside
//! of this module.

use crate::{Action, ModuleId, Resource, Role};

/// Set of resources a grant applies to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResourceSet {
    All,
    Only(&'static [Resource]),
}

impl ResourceSet {
    pub fn contains(self, resource: Resource) -> bool {
        match self {
            ResourceSet::All => true,
            ResourceSet::Only(list) => list.contains(&resource),
        }
    }
}

/// What a non-admin role may view and mutate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    pub view: ResourceSet,
    pub mutate: ResourceSet,
}

impl RoleGrant {
    pub fn allows(&self, action: Action, resource: Resource) -> bool {
        if action.is_mutation() {
            self.mutate.contains(resource)
        } else {
            self.view.contains(resource)
        }
    }
}

const SALES_MODULES: &[ModuleId] = &[ModuleId::Dashboard, ModuleId::Sales];

const STOCK_MANAGER_MODULES: &[ModuleId] = &[
    ModuleId::Dashboard,
    ModuleId::Categories,
    ModuleId::Subcategories,
    ModuleId::Inventory,
    ModuleId::Movements,
    ModuleId::Services,
];

const ACCOUNTANT_MODULES: &[ModuleId] = &[
    ModuleId::Dashboard,
    ModuleId::Payments,
    ModuleId::Customers,
    ModuleId::Recovery,
];

const EMPLOYEE_MODULES: &[ModuleId] = &[
    ModuleId::Dashboard,
    ModuleId::Inventory,
    ModuleId::Customers,
    ModuleId::Services,
];

const STOCK_RESOURCES: &[Resource] = &[
    Resource::Inventory,
    Resource::Movements,
    Resource::Campaigns,
    Resource::Categories,
    Resource::Subcategories,
    Resource::Services,
];

const SALES_GRANT: RoleGrant = RoleGrant {
    view: ResourceSet::Only(&[
        Resource::Sales,
        Resource::Customers,
        Resource::Services,
        Resource::Inventory,
    ]),
    mutate: ResourceSet::Only(&[Resource::Sales, Resource::Payments]),
};

const STOCK_MANAGER_GRANT: RoleGrant = RoleGrant {
    view: ResourceSet::Only(STOCK_RESOURCES),
    mutate: ResourceSet::Only(STOCK_RESOURCES),
};

const ACCOUNTANT_GRANT: RoleGrant = RoleGrant {
    view: ResourceSet::All,
    mutate: ResourceSet::Only(&[
        Resource::Payments,
        Resource::Settings,
        Resource::Recovery,
        Resource::Services,
        Resource::Sales,
    ]),
};

const EMPLOYEE_GRANT: RoleGrant = RoleGrant {
    view: ResourceSet::Only(&[Resource::Inventory, Resource::Customers, Resource::Services]),
    mutate: ResourceSet::Only(&[Resource::Customers]),
};

/// Module allow-list of a non-admin role. Admin roles are resolved by the engine.
pub fn role_modules(role: Role) -> &'static [ModuleId] {
    match role {
        Role::Sales => SALES_MODULES,
        Role::StockManager => STOCK_MANAGER_MODULES,
        Role::Accountant => ACCOUNTANT_MODULES,
        Role::Employee => EMPLOYEE_MODULES,
        Role::SuperAdmin | Role::Admin => &[],
    }
}

/// Resource grant of a non-admin role.
pub fn role_grant(role: Role) -> Option<RoleGrant> {
    match role {
        Role::Sales => Some(SALES_GRANT),
        Role::StockManager => Some(STOCK_MANAGER_GRANT),
        Role::Accountant => Some(ACCOUNTANT_GRANT),
        Role::Employee => Some(EMPLOYEE_GRANT),
        Role::SuperAdmin | Role::Admin => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accountant_views_everything_but_mutates_a_subset() {
        let grant = role_grant(Role::Accountant).unwrap();
        assert!(grant.allows(Action::View, Resource::Movements));
        assert!(grant.allows(Action::Create, Resource::Payments));
        assert!(!grant.allows(Action::Create, Resource::Inventory));
        assert!(!grant.allows(Action::Delete, Resource::Customers));
    }

    #[test]
    fn admin_roles_have_no_table_entry() {
        assert!(role_modules(Role::Admin).is_empty());
        assert!(role_grant(Role::SuperAdmin).is_none());
    }
}
