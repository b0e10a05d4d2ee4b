use crate::domain::bill::{Bill, Obligation};
use crate::domain::ports::BillStore;
use crate::error::{Result, SettleError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamilyDescriptor, DB, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for bills.
pub const CF_BILLS: &str = "bills";
/// Column Family for participant obligations.
pub const CF_OBLIGATIONS: &str = "obligations";
/// Column Family mapping a group id to its bill ids in creation order.
pub const CF_GROUP_INDEX: &str = "group_bills";

/// A persistent bill store backed by RocksDB.
///
/// The bill-plus-obligations fan-out is written through a single
/// `WriteBatch`, so it lands atomically. RocksDB has no conditional update,
/// so `mark_paid` and the group-index read-modify-write are serialised
/// through a process-local mutex; `Clone` shares the underlying handle.
#[derive(Clone)]
pub struct RocksDbBillStore {
    db: Arc<DB>,
    write_guard: Arc<Mutex<()>>,
}

impl RocksDbBillStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_BILLS, Options::default()),
            ColumnFamilyDescriptor::new(CF_OBLIGATIONS, Options::default()),
            ColumnFamilyDescriptor::new(CF_GROUP_INDEX, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            write_guard: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| SettleError::Store(format!("Column family {name} not found")))
    }

    fn group_index(&self, group_id: &str) -> Result<Vec<Uuid>> {
        let cf = self.cf(CF_GROUP_INDEX)?;
        match self.db.get_cf(&cf, group_id.as_bytes())? {
            Some(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| SettleError::Internal(Box::new(e)))
            }
            None => Ok(Vec::new()),
        }
    }

    fn get_obligation(&self, obligation_id: Uuid) -> Result<Option<Obligation>> {
        let cf = self.cf(CF_OBLIGATIONS)?;
        match self.db.get_cf(&cf, obligation_id.as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| SettleError::Internal(Box::new(e))),
            None => Ok(None),
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| SettleError::Internal(Box::new(e)))
}

#[async_trait]
impl BillStore for RocksDbBillStore {
    async fn create_bill(&self, bill: Bill, obligations: Vec<Obligation>) -> Result<()> {
        let _guard = self.write_guard.lock().await;

        let mut index = self.group_index(&bill.group_id)?;
        index.push(bill.id);

        let mut batch = WriteBatch::default();
        batch.put_cf(&self.cf(CF_BILLS)?, bill.id.as_bytes(), to_json(&bill)?);
        for obligation in &obligations {
            batch.put_cf(
                &self.cf(CF_OBLIGATIONS)?,
                obligation.id.as_bytes(),
                to_json(obligation)?,
            );
        }
        batch.put_cf(
            &self.cf(CF_GROUP_INDEX)?,
            bill.group_id.as_bytes(),
            to_json(&index)?,
        );
        self.db.write(batch)?;
        Ok(())
    }

    async fn latest_bill(&self, group_id: &str) -> Result<Option<Bill>> {
        let Some(bill_id) = self.group_index(group_id)?.last().copied() else {
            return Ok(None);
        };
        let cf = self.cf(CF_BILLS)?;
        match self.db.get_cf(&cf, bill_id.as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| SettleError::Internal(Box::new(e))),
            None => Ok(None),
        }
    }

    async fn obligation(&self, bill_id: Uuid, payer_id: &str) -> Result<Option<Obligation>> {
        Ok(self
            .obligations_for_bill(bill_id)
            .await?
            .into_iter()
            .find(|o| o.payer_id == payer_id))
    }

    async fn obligations_for_bill(&self, bill_id: Uuid) -> Result<Vec<Obligation>> {
        let cf = self.cf(CF_OBLIGATIONS)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start) {
            let (_key, value) =
                item.map_err(|e| SettleError::Store(format!("RocksDB iteration error: {e}")))?;
            let obligation: Obligation = serde_json::from_slice(&value)
                .map_err(|e| SettleError::Internal(Box::new(e)))?;
            if obligation.bill_id == bill_id {
                rows.push(obligation);
            }
        }
        Ok(rows)
    }

    async fn mark_paid(&self, obligation_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let _guard = self.write_guard.lock().await;

        let Some(mut obligation) = self.get_obligation(obligation_id)? else {
            return Ok(false);
        };
        if obligation.paid_at.is_some() {
            return Ok(false);
        }
        obligation.paid_at = Some(at);
        self.db.put_cf(
            &self.cf(CF_OBLIGATIONS)?,
            obligation_id.as_bytes(),
            to_json(&obligation)?,
        )?;
        Ok(true)
    }
}
