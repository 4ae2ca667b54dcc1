use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use comptoir_core::{TenantId, UserId};

use crate::{PaymentStatus, PlanId, Role, TenantAccount};

/// A user acting inside a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub roles: BTreeSet<Role>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_super_admin(&self) -> bool {
        self.has_role(Role::SuperAdmin)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

/// Explicit request context passed to every engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub tenant: TenantAccount,
}

impl Session {
    pub fn tenant_id(&self) -> TenantId {
        self.tenant.id
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }
}

/// Session claims carried by a bearer token (transport-agnostic).
///
/// Decoding and signature verification happen at the transport layer;
/// this is what is left once a token has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,
    pub tenant_id: TenantId,
    pub roles: Vec<Role>,
    pub payment_status: PaymentStatus,
    pub plan_id: PlanId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionClaims {
    pub fn into_session(self) -> Session {
        Session {
            user: User {
                id: self.sub,
                tenant_id: self.tenant_id,
                roles: self.roles.into_iter().collect(),
            },
            tenant: TenantAccount {
                id: self.tenant_id,
                payment_status: self.payment_status,
                plan_id: self.plan_id,
            },
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("token carries no role")]
    NoRoles,
}

/// Validate the time window and role set of already-decoded claims.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    if claims.roles.is_empty() {
        return Err(TokenValidationError::NoRoles);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn claims(issued_at: DateTime<Utc>, ttl: Duration) -> SessionClaims {
        SessionClaims {
            sub: UserId::new(),
            tenant_id: TenantId::new(),
            roles: vec![Role::Sales, Role::Sales, Role::Accountant],
            payment_status: PaymentStatus::Trial,
            plan_id: PlanId::new("BASIC"),
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    #[test]
    fn rejects_expired_and_future_tokens() {
        let now = Utc::now();
        let expired = claims(now - Duration::hours(2), Duration::hours(1));
        assert_eq!(validate_claims(&expired, now), Err(TokenValidationError::Expired));

        let future = claims(now + Duration::minutes(5), Duration::hours(1));
        assert_eq!(validate_claims(&future, now), Err(TokenValidationError::NotYetValid));

        let inverted = claims(now, Duration::hours(-1));
        assert_eq!(
            validate_claims(&inverted, now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn session_dedupes_roles_and_binds_tenant() {
        let c = claims(Utc::now(), Duration::hours(1));
        let tenant_id = c.tenant_id;
        let session = c.into_session();

        assert_eq!(session.user.roles.len(), 2);
        assert_eq!(session.user.tenant_id, tenant_id);
        assert_eq!(session.tenant_id(), tenant_id);
    }
}
