//! Per-tenant row storage behind the projections and directories.

pub mod tenant_store;

pub use tenant_store::{InMemoryTenantStore, TenantStore};
