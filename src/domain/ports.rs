use crate::domain::bill::{Bill, Obligation};
use crate::domain::slip::SlipRecord;
use crate::error::{ExtractError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Transactional store for bills and their participant obligations.
#[async_trait]
pub trait BillStore: Send + Sync {
    /// Persists a bill together with all of its obligation rows as a single
    /// all-or-nothing unit.
    async fn create_bill(&self, bill: Bill, obligations: Vec<Obligation>) -> Result<()>;

    /// The most recently created bill for a group, if any.
    async fn latest_bill(&self, group_id: &str) -> Result<Option<Bill>>;

    /// The obligation row for one payer within one bill.
    async fn obligation(&self, bill_id: Uuid, payer_id: &str) -> Result<Option<Obligation>>;

    /// All obligation rows of a bill, for the status view.
    async fn obligations_for_bill(&self, bill_id: Uuid) -> Result<Vec<Obligation>>;

    /// Conditionally transitions an obligation from unpaid to paid.
    ///
    /// Returns `true` when this call performed the transition and `false`
    /// when the obligation was already paid. This single row-scoped update
    /// is what keeps racing duplicate submissions correct.
    async fn mark_paid(&self, obligation_id: Uuid, at: DateTime<Utc>) -> Result<bool>;
}

/// Vision-backed extraction of a structured record from slip image bytes.
///
/// Two calls on the same image are not guaranteed to produce identical
/// output; callers must treat the result as a one-shot reading.
#[async_trait]
pub trait SlipExtractor: Send + Sync {
    async fn extract(&self, image: &[u8]) -> std::result::Result<SlipRecord, ExtractError>;
}

/// Scans image bytes for a 2D barcode payload.
///
/// Advisory only: the payload gates "is this plausibly a payment slip", the
/// authoritative transaction data comes from the extractor. Unreadable bytes
/// report `None` rather than an error.
pub trait QrScanner: Send + Sync {
    fn scan(&self, image: &[u8]) -> Result<Option<String>>;
}

/// Fetches raw message content (image bytes) from the chat platform.
#[async_trait]
pub trait MessageContent: Send + Sync {
    async fn fetch(&self, message_id: &str) -> Result<Vec<u8>>;
}

pub type BillStoreBox = Box<dyn BillStore>;
pub type SlipExtractorBox = Box<dyn SlipExtractor>;
pub type QrScannerBox = Box<dyn QrScanner>;
pub type MessageContentBox = Box<dyn MessageContent>;
