use crate::domain::bill::{Bill, Obligation};
use crate::domain::ports::BillStore;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    bills: HashMap<Uuid, Bill>,
    obligations: HashMap<Uuid, Obligation>,
    /// Bill ids per group in creation order; the last entry is the group's
    /// active bill.
    group_bills: HashMap<String, Vec<Uuid>>,
}

/// A thread-safe in-memory bill store.
///
/// All writes go through a single `RwLock`, so the bill-plus-obligations
/// fan-out is atomic and `mark_paid` is a genuine conditional single-row
/// update. Ideal for tests and for the one-shot CLI without persistence.
#[derive(Default, Clone)]
pub struct InMemoryBillStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryBillStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BillStore for InMemoryBillStore {
    async fn create_bill(&self, bill: Bill, obligations: Vec<Obligation>) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .group_bills
            .entry(bill.group_id.clone())
            .or_default()
            .push(bill.id);
        for obligation in obligations {
            state.obligations.insert(obligation.id, obligation);
        }
        state.bills.insert(bill.id, bill);
        Ok(())
    }

    async fn latest_bill(&self, group_id: &str) -> Result<Option<Bill>> {
        let state = self.state.read().await;
        let latest = state
            .group_bills
            .get(group_id)
            .and_then(|ids| ids.last())
            .and_then(|id| state.bills.get(id))
            .cloned();
        Ok(latest)
    }

    async fn obligation(&self, bill_id: Uuid, payer_id: &str) -> Result<Option<Obligation>> {
        let state = self.state.read().await;
        let row = state
            .obligations
            .values()
            .find(|o| o.bill_id == bill_id && o.payer_id == payer_id)
            .cloned();
        Ok(row)
    }

    async fn obligations_for_bill(&self, bill_id: Uuid) -> Result<Vec<Obligation>> {
        let state = self.state.read().await;
        Ok(state
            .obligations
            .values()
            .filter(|o| o.bill_id == bill_id)
            .cloned()
            .collect())
    }

    async fn mark_paid(&self, obligation_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.obligations.get_mut(&obligation_id) {
            Some(obligation) if obligation.paid_at.is_none() => {
                obligation.paid_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
