use crate::domain::money::Amount;
use crate::error::{Result, SettleError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a bill total maps to per-member dues.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum SplitPolicy {
    /// Total divided evenly across the selected members.
    Equal,
    /// Every selected member owes the stated total.
    Each,
}

/// A group monetary obligation. Immutable once created; settlement state
/// lives on the participant [`Obligation`] rows.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Bill {
    pub id: Uuid,
    pub group_id: String,
    pub title: String,
    pub total: Amount,
    pub policy: SplitPolicy,
    pub created_at: DateTime<Utc>,
}

impl Bill {
    pub fn new(
        group_id: impl Into<String>,
        title: impl Into<String>,
        total: Amount,
        policy: SplitPolicy,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id: group_id.into(),
            title: title.into(),
            total,
            policy,
            created_at: Utc::now(),
        }
    }

    /// Fans the bill out into one obligation row per selected member.
    ///
    /// Under [`SplitPolicy::Equal`] each member owes `total / n` rounded to
    /// cents; under [`SplitPolicy::Each`] each member owes the stated total.
    pub fn obligations_for(&self, members: &[String]) -> Result<Vec<Obligation>> {
        if members.is_empty() {
            return Err(SettleError::Validation(
                "A bill needs at least one member".to_string(),
            ));
        }
        let due = match self.policy {
            SplitPolicy::Equal => self.total.split_evenly(members.len())?,
            SplitPolicy::Each => self.total,
        };
        Ok(members
            .iter()
            .map(|payer| Obligation::new(self.id, payer.clone(), due))
            .collect())
    }
}

/// One payer's owed amount within a bill. Transitions from unpaid to paid
/// exactly once and never reverts.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Obligation {
    pub id: Uuid,
    pub bill_id: Uuid,
    pub payer_id: String,
    pub due: Amount,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Obligation {
    pub fn new(bill_id: Uuid, payer_id: String, due: Amount) -> Self {
        Self {
            id: Uuid::new_v4(),
            bill_id,
            payer_id,
            due,
            paid_at: None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some()
    }
}

/// A resolved, still-unpaid obligation together with the bill context the
/// reconciliation replies report.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingObligation {
    pub obligation: Obligation,
    pub bill_title: String,
}
