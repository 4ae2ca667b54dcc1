use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use comptoir_core::{DomainError, Money, TenantId};
use comptoir_entitlements::{Action, EntitlementEngine, Resource, Session};
use comptoir_sales::ServiceId;

use super::{LogRejection, authorize};
use crate::read_model::{InMemoryTenantStore, TenantStore};

/// A non-stocked service a tenant sells (repairs, delivery fees, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceOffering {
    pub id: ServiceId,
    pub name: String,
    pub unit_price: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewService {
    pub name: String,
    pub unit_price: Money,
}

#[derive(Debug)]
pub struct ServiceCatalog {
    store: InMemoryTenantStore<ServiceId, ServiceOffering>,
    engine: Arc<EntitlementEngine>,
}

impl ServiceCatalog {
    pub fn new(engine: Arc<EntitlementEngine>) -> Self {
        Self {
            store: InMemoryTenantStore::new(),
            engine,
        }
    }

    #[instrument(skip_all, fields(tenant_id = %session.tenant_id()))]
    pub fn register(&self, session: &Session, service: NewService) -> Result<ServiceOffering, DomainError> {
        self.try_register(session, service).log_rejection("register_service")
    }

    fn try_register(&self, session: &Session, service: NewService) -> Result<ServiceOffering, DomainError> {
        authorize(&self.engine, session, Action::Create, Resource::Services)?;

        let name = service.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("service name cannot be empty"));
        }
        if service.unit_price.is_negative() {
            return Err(DomainError::validation("unit price cannot be negative"));
        }

        let offering = ServiceOffering {
            id: ServiceId::new(),
            name: name.to_string(),
            unit_price: service.unit_price,
            created_at: Utc::now(),
        };
        self.store.upsert(session.tenant_id(), offering.id, offering.clone());

        info!(service_id = %offering.id, "service registered");
        Ok(offering)
    }

    pub fn list(&self, session: &Session) -> Result<Vec<ServiceOffering>, DomainError> {
        authorize(&self.engine, session, Action::View, Resource::Services)?;
        let mut services = self.store.list(session.tenant_id());
        services.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(services)
    }

    pub(crate) fn ensure_exists(&self, tenant_id: TenantId, id: ServiceId) -> Result<(), DomainError> {
        match self.store.get(tenant_id, &id) {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found(format!("service {id}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use comptoir_core::UserId;
    use comptoir_entitlements::{PaymentStatus, PlanId, Role, TenantAccount, User};

    use super::*;

    fn session(role: Role) -> Session {
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
                plan_id: PlanId::from("PREMIUM"),
            },
        }
    }

    fn offering(name: &str, price: i64) -> NewService {
        NewService {
            name: name.to_string(),
            unit_price: Money::new(price),
        }
    }

    #[test]
    fn services_are_listed_by_name_per_tenant() {
        let catalog = ServiceCatalog::new(Arc::new(EntitlementEngine::default()));
        let a = session(Role::Admin);
        let b = session(Role::Admin);

        let pose = catalog.register(&a, offering("Pose", 2_000)).unwrap();
        catalog.register(&a, offering("Livraison", 500)).unwrap();

        let names: Vec<_> = catalog.list(&a).unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["Livraison", "Pose"]);
        assert!(catalog.list(&b).unwrap().is_empty());

        assert!(catalog.ensure_exists(a.tenant_id(), pose.id).is_ok());
        assert!(matches!(
            catalog.ensure_exists(b.tenant_id(), pose.id),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn bad_offerings_and_foreign_roles_are_rejected() {
        let catalog = ServiceCatalog::new(Arc::new(EntitlementEngine::default()));
        let admin = session(Role::Admin);

        let err = catalog.register(&admin, offering("  ", 100)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        let err = catalog.register(&admin, offering("Pose", -1)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let seller = session(Role::Sales);
        let err = catalog.register(&seller, offering("Pose", 100)).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
        assert!(catalog.list(&seller).unwrap().is_empty());
    }
}
