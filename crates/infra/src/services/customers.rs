use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use comptoir_core::{CustomerId, DomainError, TenantId, UserId};
use comptoir_entitlements::{Action, EntitlementEngine, QuotaResource, Resource, Session};

use super::{LogRejection, authorize};
use crate::quota::{QuotaPeriod, TenantQuotas};
use crate::read_model::{InMemoryTenantStore, TenantStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub phone: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub name: String,
    pub phone: Option<String>,
}

/// Per-tenant customer directory, guarded by the plan's customer quota.
#[derive(Debug)]
pub struct CustomerDirectory {
    store: InMemoryTenantStore<CustomerId, Customer>,
    engine: Arc<EntitlementEngine>,
    quotas: Arc<TenantQuotas>,
}

impl CustomerDirectory {
    pub fn new(engine: Arc<EntitlementEngine>, quotas: Arc<TenantQuotas>) -> Self {
        Self {
            store: InMemoryTenantStore::new(),
            engine,
            quotas,
        }
    }

    #[instrument(skip_all, fields(tenant_id = %session.tenant_id()))]
    pub fn register(&self, session: &Session, customer: NewCustomer) -> Result<Customer, DomainError> {
        self.try_register(session, customer).log_rejection("register_customer")
    }

    fn try_register(&self, session: &Session, customer: NewCustomer) -> Result<Customer, DomainError> {
        authorize(&self.engine, session, Action::Create, Resource::Customers)?;

        let name = customer.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("customer name cannot be empty"));
        }
        let phone = customer
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        let tenant_id = session.tenant_id();
        let reservation = self
            .quotas
            .try_reserve(tenant_id, QuotaResource::Customers, QuotaPeriod::Lifetime, |count| {
                self.engine.is_creation_allowed(session, Resource::Customers, count)
            })?;

        let record = Customer {
            id: CustomerId::new(),
            name: name.to_string(),
            phone,
            created_by: session.user_id(),
            created_at: Utc::now(),
        };
        self.store.upsert(tenant_id, record.id, record.clone());
        reservation.confirm();

        info!(customer_id = %record.id, "customer registered");
        Ok(record)
    }

    /// Customers of the caller's tenant, by name.
    pub fn list(&self, session: &Session) -> Result<Vec<Customer>, DomainError> {
        authorize(&self.engine, session, Action::View, Resource::Customers)?;
        let mut customers = self.store.list(session.tenant_id());
        customers.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(customers)
    }

    pub fn get(&self, session: &Session, id: CustomerId) -> Result<Customer, DomainError> {
        authorize(&self.engine, session, Action::View, Resource::Customers)?;
        self.store
            .get(session.tenant_id(), &id)
            .ok_or_else(|| DomainError::not_found(format!("customer {id}")))
    }

    pub(crate) fn ensure_exists(&self, tenant_id: TenantId, id: CustomerId) -> Result<(), DomainError> {
        match self.store.get(tenant_id, &id) {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found(format!("customer {id}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use comptoir_entitlements::{PaymentStatus, PlanId, Role, TenantAccount, User};

    use super::*;

    fn session(plan: &str, role: Role) -> Session {
        let tenant_id = TenantId::new();
        Session {
            user: User {
                id: UserId::new(),
                tenant_id,
                roles: BTreeSet::from([role]),
            },
            tenant: TenantAccount {
                id: tenant_id,
                payment_status: PaymentStatus::UpToDate,
                plan_id: PlanId::from(plan),
            },
        }
    }

    fn directory() -> CustomerDirectory {
        CustomerDirectory::new(Arc::new(EntitlementEngine::default()), Arc::new(TenantQuotas::new()))
    }

    fn named(name: &str) -> NewCustomer {
        NewCustomer {
            name: name.to_string(),
            phone: None,
        }
    }

    #[test]
    fn basic_plan_stops_at_five_customers() {
        let dir = directory();
        let s = session("BASIC", Role::Admin);
        for i in 0..5 {
            dir.register(&s, named(&format!("client {i}"))).unwrap();
        }

        let err = dir.register(&s, named("client 6")).unwrap_err();
        assert!(matches!(err, DomainError::QuotaExceeded(_)));
        assert_eq!(dir.list(&s).unwrap().len(), 5);
    }

    #[test]
    fn failed_registration_does_not_consume_quota() {
        let dir = directory();
        let s = session("BASIC", Role::Admin);
        assert!(dir.register(&s, named("   ")).is_err());
        for i in 0..5 {
            dir.register(&s, named(&format!("client {i}"))).unwrap();
        }
    }

    #[test]
    fn sales_role_cannot_register_customers() {
        let dir = directory();
        let s = session("PREMIUM", Role::Sales);
        let err = dir.register(&s, named("Awa")).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn customers_are_tenant_scoped() {
        let dir = directory();
        let a = session("PREMIUM", Role::Admin);
        let b = session("PREMIUM", Role::Admin);
        let c = dir.register(&a, named("Awa")).unwrap();

        assert!(matches!(dir.get(&b, c.id), Err(DomainError::NotFound(_))));
        assert_eq!(dir.get(&a, c.id).unwrap().name, "Awa");
    }
}
