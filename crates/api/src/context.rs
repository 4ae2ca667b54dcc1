use comptoir_core::TenantId;
use comptoir_entitlements::Session;

/// Authenticated session of a request.
///
/// Inserted by the auth middleware; every protected handler reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    session: Session,
}

impl SessionContext {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn tenant_id(&self) -> TenantId {
        self.session.tenant_id()
    }
}
