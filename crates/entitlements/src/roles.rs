use core::str::FromStr;

use serde::{Deserialize, Serialize};

use comptoir_core::DomainError;

/// Role held by a user. A user may hold several; capabilities are unioned.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Platform operator; tenant-exempt, only ever sees the `superadmin` module.
    SuperAdmin,
    Admin,
    Sales,
    StockManager,
    Accountant,
    Employee,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::Sales,
        Role::StockManager,
        Role::Accountant,
        Role::Employee,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::Admin => "ADMIN",
            Role::Sales => "SALES",
            Role::StockManager => "STOCK_MANAGER",
            Role::Accountant => "ACCOUNTANT",
            Role::Employee => "EMPLOYEE",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::validation(format!("unknown role '{s}'")))
    }
}
