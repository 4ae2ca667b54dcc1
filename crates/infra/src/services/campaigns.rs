use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use comptoir_core::DomainError;
use comptoir_entitlements::{Action, EntitlementEngine, Resource, Session};
use comptoir_inventory::{
    Campaign, CampaignCommand, CampaignId, CampaignStatus, CloseCampaign, MovementKind, OpenCampaign, StockItemId,
};

use super::postings::Postings;
use super::{Dispatcher, LogRejection, authorize, load_board};
use crate::command_dispatcher::{DispatchError, UnitOfWork};

pub const COUNT_ADJUSTMENT_REASON: &str = "inventory count";

/// Physical stock counts. While a campaign is `DRAFT`, every other sale and
/// stock mutation of the tenant is rejected with `Locked`.
pub struct CampaignService {
    dispatcher: Arc<Dispatcher>,
    engine: Arc<EntitlementEngine>,
}

impl CampaignService {
    pub fn new(dispatcher: Arc<Dispatcher>, engine: Arc<EntitlementEngine>) -> Self {
        Self { dispatcher, engine }
    }

    #[instrument(skip_all, fields(tenant_id = %session.tenant_id()))]
    pub fn open(&self, session: &Session, label: &str) -> Result<Campaign, DispatchError> {
        self.try_open(session, label).log_rejection("open_campaign")
    }

    fn try_open(&self, session: &Session, label: &str) -> Result<Campaign, DispatchError> {
        authorize(&self.engine, session, Action::Create, Resource::Campaigns)?;
        let tenant_id = session.tenant_id();
        let campaign_id = CampaignId::new();

        let mut board = load_board(&self.dispatcher, tenant_id)?;
        board.execute(&CampaignCommand::Open(OpenCampaign {
            tenant_id,
            campaign_id,
            label: label.to_string(),
            opened_by: session.user_id(),
            occurred_at: Utc::now(),
        }))?;

        let mut uow = UnitOfWork::new(tenant_id);
        let board = uow.stage(board)?;
        self.dispatcher.commit(uow)?;

        info!(campaign_id = %campaign_id, "inventory campaign opened");
        campaign_of(&board, campaign_id)
    }

    /// Close with the counted quantities: one `ADJUSTMENT` per item whose
    /// count differs from its ledger level, committed with the closure.
    #[instrument(skip_all, fields(tenant_id = %session.tenant_id(), campaign_id = %campaign_id))]
    pub fn close(
        &self,
        session: &Session,
        campaign_id: CampaignId,
        counts: &[(StockItemId, u64)],
    ) -> Result<Campaign, DispatchError> {
        self.try_close(session, campaign_id, counts).log_rejection("close_campaign")
    }

    fn try_close(
        &self,
        session: &Session,
        campaign_id: CampaignId,
        counts: &[(StockItemId, u64)],
    ) -> Result<Campaign, DispatchError> {
        authorize(&self.engine, session, Action::Edit, Resource::Campaigns)?;
        let tenant_id = session.tenant_id();
        let mut board = load_board(&self.dispatcher, tenant_id)?;

        match board.aggregate().campaign(campaign_id) {
            None => return Err(DomainError::not_found(format!("campaign {campaign_id}")).into()),
            Some(c) if c.status == CampaignStatus::Closed => {
                return Err(DomainError::invalid_state(format!("campaign '{}' is already closed", c.label)).into());
            }
            Some(_) => {}
        }

        let mut seen = BTreeSet::new();
        if let Some((dup, _)) = counts.iter().find(|(id, _)| !seen.insert(*id)) {
            return Err(DomainError::validation(format!("stock item {dup} counted twice")).into());
        }

        let now = Utc::now();
        let reference = campaign_id.to_string();
        let mut postings = Postings::new(&self.dispatcher, tenant_id, session.user_id(), now);
        let mut adjustments = 0u32;
        for &(stock_item_id, counted) in counts {
            let level = postings.level(stock_item_id)?;
            if let Some((kind, quantity)) = MovementKind::adjustment_between(level, counted) {
                postings.post(stock_item_id, kind, quantity, COUNT_ADJUSTMENT_REASON, Some(&reference))?;
                adjustments += 1;
            }
        }

        board.execute(&CampaignCommand::Close(CloseCampaign {
            tenant_id,
            campaign_id,
            adjustments,
            closed_by: session.user_id(),
            occurred_at: now,
        }))?;

        let mut uow = UnitOfWork::new(tenant_id);
        let board = uow.stage(board)?;
        postings.stage_into(&mut uow)?;
        self.dispatcher.commit(uow)?;

        info!(adjustments, "inventory campaign closed");
        campaign_of(&board, campaign_id)
    }

    /// The campaign currently freezing mutations, if any.
    pub fn active(&self, session: &Session) -> Result<Option<Campaign>, DispatchError> {
        authorize(&self.engine, session, Action::View, Resource::Campaigns)?;
        let board = load_board(&self.dispatcher, session.tenant_id())?;
        Ok(board.aggregate().active_draft().cloned())
    }

    /// Every campaign of the tenant, most recent first.
    pub fn list(&self, session: &Session) -> Result<Vec<Campaign>, DispatchError> {
        authorize(&self.engine, session, Action::View, Resource::Campaigns)?;
        let board = load_board(&self.dispatcher, session.tenant_id())?;
        let mut campaigns = board.aggregate().campaigns().to_vec();
        campaigns.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        Ok(campaigns)
    }
}

fn campaign_of(board: &comptoir_inventory::CampaignBoard, id: CampaignId) -> Result<Campaign, DispatchError> {
    board
        .campaign(id)
        .cloned()
        .ok_or_else(|| DomainError::not_found(format!("campaign {id}")).into())
}
