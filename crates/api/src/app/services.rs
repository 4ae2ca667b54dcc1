//! Engine wiring behind the HTTP surface.

use comptoir_entitlements::EntitlementEngine;
use comptoir_infra::{Backoffice, EngineConfig};

/// Shared by every handler through an `Extension<Arc<AppServices>>`.
pub struct AppServices {
    backoffice: Backoffice,
}

impl AppServices {
    pub fn new(backoffice: Backoffice) -> Self {
        Self { backoffice }
    }

    /// In-memory engines configured from `config`.
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(Backoffice::in_memory(config))
    }

    pub fn backoffice(&self) -> &Backoffice {
        &self.backoffice
    }

    pub fn engine(&self) -> &EntitlementEngine {
        &self.backoffice.engine
    }
}
