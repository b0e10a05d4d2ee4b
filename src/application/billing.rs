use crate::domain::bill::{Bill, Obligation, SplitPolicy};
use crate::domain::money::Amount;
use crate::domain::ports::BillStoreBox;
use crate::error::{Result, SettleError};
use rust_decimal::Decimal;
use tracing::info;

/// The active bill of a group together with its per-member settlement state.
#[derive(Debug, Clone, PartialEq)]
pub struct BillStatus {
    pub bill: Bill,
    pub obligations: Vec<Obligation>,
}

impl BillStatus {
    pub fn paid_count(&self) -> usize {
        self.obligations.iter().filter(|o| o.is_paid()).count()
    }
}

/// Creates bills and reports on the group's active bill.
pub struct BillingService {
    store: BillStoreBox,
}

impl BillingService {
    pub fn new(store: BillStoreBox) -> Self {
        Self { store }
    }

    /// Creates a bill and its obligation fan-out in one atomic unit.
    pub async fn create_bill(
        &self,
        group_id: &str,
        title: &str,
        total: Decimal,
        policy: SplitPolicy,
        members: &[String],
    ) -> Result<Bill> {
        let mut unique = members.to_vec();
        unique.sort();
        unique.dedup();
        if unique.len() != members.len() {
            return Err(SettleError::Validation(
                "Duplicate members in bill".to_string(),
            ));
        }

        let total = Amount::new(total)?;
        let bill = Bill::new(group_id, title, total, policy);
        let obligations = bill.obligations_for(members)?;
        self.store.create_bill(bill.clone(), obligations).await?;
        info!(
            group_id,
            bill_id = %bill.id,
            members = members.len(),
            "bill created"
        );
        Ok(bill)
    }

    /// The group's active (most recent) bill and its obligations, or `None`
    /// when the group has no bills.
    pub async fn bill_status(&self, group_id: &str) -> Result<Option<BillStatus>> {
        let Some(bill) = self.store.latest_bill(group_id).await? else {
            return Ok(None);
        };
        let mut obligations = self.store.obligations_for_bill(bill.id).await?;
        obligations.sort_by(|a, b| a.payer_id.cmp(&b.payer_id));
        Ok(Some(BillStatus { bill, obligations }))
    }
}
