//! Identifiers, money, the error taxonomy and the aggregate contract shared
//! by the entitlement, stock ledger and sale crates.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult, ErrorKind};
pub use id::{AggregateId, CustomerId, TenantId, UserId};
pub use money::{Money, TaxRate};
