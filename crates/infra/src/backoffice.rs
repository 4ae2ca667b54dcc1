//! Composition root: one store, one read-model hub, every service.

use std::sync::Arc;

use tracing::info;

use comptoir_entitlements::EntitlementEngine;

use crate::command_dispatcher::CommandDispatcher;
use crate::config::EngineConfig;
use crate::event_store::{EventStore, InMemoryEventStore};
use crate::projections::ProjectionHub;
use crate::quota::TenantQuotas;
use crate::services::{
    CampaignService, CustomerDirectory, Dispatcher, SaleLifecycleManager, ServiceCatalog, StockLedger,
};

pub struct Backoffice {
    pub engine: Arc<EntitlementEngine>,
    pub quotas: Arc<TenantQuotas>,
    pub customers: Arc<CustomerDirectory>,
    pub services: Arc<ServiceCatalog>,
    pub stock: StockLedger,
    pub campaigns: CampaignService,
    pub sales: SaleLifecycleManager,
    dispatcher: Arc<Dispatcher>,
}

impl Backoffice {
    /// Everything in memory (single process; state is lost on restart).
    pub fn in_memory(config: EngineConfig) -> Self {
        let store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
        Self::with_store(store, config)
    }

    pub fn with_store(store: Arc<dyn EventStore>, config: EngineConfig) -> Self {
        let tax_rate = config.tax_rate();
        let dispatcher = Arc::new(CommandDispatcher::new(store, Arc::new(ProjectionHub::new())));
        let engine = Arc::new(EntitlementEngine::new(config.plan_catalog));
        let quotas = Arc::new(TenantQuotas::new());
        let customers = Arc::new(CustomerDirectory::new(Arc::clone(&engine), Arc::clone(&quotas)));
        let services = Arc::new(ServiceCatalog::new(Arc::clone(&engine)));

        info!(tax_rate_bps = tax_rate.bps(), "back-office engines ready");

        Self {
            stock: StockLedger::new(Arc::clone(&dispatcher), Arc::clone(&engine)),
            campaigns: CampaignService::new(Arc::clone(&dispatcher), Arc::clone(&engine)),
            sales: SaleLifecycleManager::new(
                Arc::clone(&dispatcher),
                Arc::clone(&engine),
                Arc::clone(&quotas),
                Arc::clone(&customers),
                Arc::clone(&services),
                tax_rate,
            ),
            engine,
            quotas,
            customers,
            services,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
