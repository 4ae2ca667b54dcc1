//! Inventory campaigns (physical stock counts).
//!
//! One `CampaignBoard` stream exists per tenant. While the board holds a
//! `DRAFT` campaign, stock- and sale-affecting mutations of that tenant are
//! refused by the services that read the board.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use comptoir_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use comptoir_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignId(Uuid);

impl CampaignId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for CampaignId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for CampaignId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for CampaignId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::invalid_id(format!("CampaignId: {e}")))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Draft,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub label: String,
    pub status: CampaignStatus,
    pub opened_by: UserId,
    pub opened_at: DateTime<Utc>,
    pub closed_by: Option<UserId>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Number of adjustment movements posted at closure.
    pub adjustments: u32,
}

/// Aggregate root: all inventory campaigns of one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignBoard {
    id: AggregateId,
    tenant_id: Option<TenantId>,
    campaigns: Vec<Campaign>,
    version: u64,
}

impl CampaignBoard {
    pub fn stream_id(tenant_id: TenantId) -> AggregateId {
        AggregateId::tenant_singleton(tenant_id)
    }

    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            tenant_id: None,
            campaigns: Vec::new(),
            version: 0,
        }
    }

    pub fn campaigns(&self) -> &[Campaign] {
        &self.campaigns
    }

    pub fn campaign(&self, id: CampaignId) -> Option<&Campaign> {
        self.campaigns.iter().find(|c| c.id == id)
    }

    /// The campaign currently freezing mutations, if any.
    pub fn active_draft(&self) -> Option<&Campaign> {
        self.campaigns.iter().find(|c| c.status == CampaignStatus::Draft)
    }

    /// `Locked` while a campaign is in progress.
    pub fn ensure_unlocked(&self) -> Result<(), DomainError> {
        match self.active_draft() {
            Some(c) => Err(DomainError::locked(format!(
                "inventory campaign '{}' is in progress",
                c.label
            ))),
            None => Ok(()),
        }
    }
}

impl AggregateRoot for CampaignBoard {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenCampaign {
    pub tenant_id: TenantId,
    pub campaign_id: CampaignId,
    pub label: String,
    pub opened_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseCampaign {
    pub tenant_id: TenantId,
    pub campaign_id: CampaignId,
    pub adjustments: u32,
    pub closed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignCommand {
    Open(OpenCampaign),
    Close(CloseCampaign),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignOpened {
    pub tenant_id: TenantId,
    pub campaign_id: CampaignId,
    pub label: String,
    pub opened_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignClosed {
    pub tenant_id: TenantId,
    pub campaign_id: CampaignId,
    pub adjustments: u32,
    pub closed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignEvent {
    Opened(CampaignOpened),
    Closed(CampaignClosed),
}

impl Event for CampaignEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CampaignEvent::Opened(_) => "inventory.campaign.opened",
            CampaignEvent::Closed(_) => "inventory.campaign.closed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CampaignEvent::Opened(e) => e.occurred_at,
            CampaignEvent::Closed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for CampaignBoard {
    type Command = CampaignCommand;
    type Event = CampaignEvent;
    type Error = DomainError;

    const AGGREGATE_TYPE: &'static str = "inventory.campaign_board";

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CampaignEvent::Opened(e) => {
                self.tenant_id = Some(e.tenant_id);
                self.campaigns.push(Campaign {
                    id: e.campaign_id,
                    label: e.label.clone(),
                    status: CampaignStatus::Draft,
                    opened_by: e.opened_by,
                    opened_at: e.occurred_at,
                    closed_by: None,
                    closed_at: None,
                    adjustments: 0,
                });
            }
            CampaignEvent::Closed(e) => {
                if let Some(c) = self.campaigns.iter_mut().find(|c| c.id == e.campaign_id) {
                    c.status = CampaignStatus::Closed;
                    c.closed_by = Some(e.closed_by);
                    c.closed_at = Some(e.occurred_at);
                    c.adjustments = e.adjustments;
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CampaignCommand::Open(cmd) => self.handle_open(cmd),
            CampaignCommand::Close(cmd) => self.handle_close(cmd),
        }
    }
}

impl CampaignBoard {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if self.id != Self::stream_id(tenant_id) {
            return Err(DomainError::forbidden("campaign board belongs to another tenant"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenCampaign) -> Result<Vec<CampaignEvent>, DomainError> {
        self.ensure_tenant(cmd.tenant_id)?;
        let label = cmd.label.trim();
        if label.is_empty() {
            return Err(DomainError::validation("campaign label cannot be empty"));
        }
        if let Some(active) = self.active_draft() {
            return Err(DomainError::invalid_state(format!(
                "campaign '{}' is already in progress",
                active.label
            )));
        }

        Ok(vec![CampaignEvent::Opened(CampaignOpened {
            tenant_id: cmd.tenant_id,
            campaign_id: cmd.campaign_id,
            label: label.to_string(),
            opened_by: cmd.opened_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &CloseCampaign) -> Result<Vec<CampaignEvent>, DomainError> {
        self.ensure_tenant(cmd.tenant_id)?;
        let campaign = self
            .campaign(cmd.campaign_id)
            .ok_or_else(|| DomainError::not_found(format!("campaign {}", cmd.campaign_id)))?;
        if campaign.status == CampaignStatus::Closed {
            return Err(DomainError::invalid_state("campaign is already closed"));
        }

        Ok(vec![CampaignEvent::Closed(CampaignClosed {
            tenant_id: cmd.tenant_id,
            campaign_id: cmd.campaign_id,
            adjustments: cmd.adjustments,
            closed_by: cmd.closed_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use comptoir_events::execute;

    use super::*;

    fn open(tenant_id: TenantId, label: &str) -> CampaignCommand {
        CampaignCommand::Open(OpenCampaign {
            tenant_id,
            campaign_id: CampaignId::new(),
            label: label.to_string(),
            opened_by: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    fn close(tenant_id: TenantId, campaign_id: CampaignId) -> CampaignCommand {
        CampaignCommand::Close(CloseCampaign {
            tenant_id,
            campaign_id,
            adjustments: 2,
            closed_by: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn open_locks_until_closed() {
        let tenant_id = TenantId::new();
        let mut board = CampaignBoard::empty(CampaignBoard::stream_id(tenant_id));
        assert!(board.ensure_unlocked().is_ok());

        execute(&mut board, &open(tenant_id, "Q3 count")).unwrap();
        let err = board.ensure_unlocked().unwrap_err();
        assert!(matches!(err, DomainError::Locked(_)));

        let id = board.active_draft().unwrap().id;
        execute(&mut board, &close(tenant_id, id)).unwrap();
        assert!(board.ensure_unlocked().is_ok());
        assert_eq!(board.campaign(id).unwrap().adjustments, 2);
        assert_eq!(board.version(), 2);
    }

    #[test]
    fn only_one_draft_at_a_time() {
        let tenant_id = TenantId::new();
        let mut board = CampaignBoard::empty(CampaignBoard::stream_id(tenant_id));
        execute(&mut board, &open(tenant_id, "first")).unwrap();
        let err = board.handle(&open(tenant_id, "second")).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn close_rejects_unknown_and_closed_campaigns() {
        let tenant_id = TenantId::new();
        let mut board = CampaignBoard::empty(CampaignBoard::stream_id(tenant_id));
        let err = board.handle(&close(tenant_id, CampaignId::new())).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));

        execute(&mut board, &open(tenant_id, "count")).unwrap();
        let id = board.campaigns()[0].id;
        execute(&mut board, &close(tenant_id, id)).unwrap();
        let err = board.handle(&close(tenant_id, id)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn rejects_blank_label_and_foreign_tenant() {
        let tenant_id = TenantId::new();
        let board = CampaignBoard::empty(CampaignBoard::stream_id(tenant_id));
        assert!(matches!(
            board.handle(&open(tenant_id, "   ")).unwrap_err(),
            DomainError::Validation(_)
        ));
        assert!(matches!(
            board.handle(&open(TenantId::new(), "count")).unwrap_err(),
            DomainError::Forbidden(_)
        ));
    }
}
