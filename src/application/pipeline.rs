use crate::domain::bill::PendingObligation;
use crate::domain::money::Amount;
use crate::domain::ports::{BillStoreBox, QrScannerBox, SlipExtractorBox};
use crate::domain::reconcile::{Reconciliation, reconcile};
use crate::error::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// How the pipeline addresses an obligation for an inbound slip.
///
/// `LatestBill` deliberately means a payer cannot settle an older unpaid
/// bill once a newer one exists for the group. Resolution keyed by an
/// explicit bill reference would be a new variant, not a change to this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionPolicy {
    #[default]
    LatestBill,
}

/// Explicit policy choices for the slip pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelinePolicy {
    /// When true, an image without a decodable QR payload is rejected
    /// before extraction; when false the QR result is advisory only.
    pub require_qr: bool,
    pub resolution: ResolutionPolicy,
}

impl Default for PipelinePolicy {
    fn default() -> Self {
        Self {
            require_qr: true,
            resolution: ResolutionPolicy::LatestBill,
        }
    }
}

/// Terminal outcome of one inbound slip image. Every variant maps to
/// exactly one user-facing reply.
#[derive(Debug, Clone, PartialEq)]
pub enum SlipOutcome {
    NoQrDetected,
    ExtractionFailed(String),
    AmountMissing,
    NoPendingObligation,
    Mismatch {
        bill_title: String,
        due: Amount,
        received: Decimal,
    },
    Confirmed {
        bill_title: String,
        due: Amount,
        received: Decimal,
    },
    /// A racing duplicate settled the obligation first.
    AlreadyConfirmed { bill_title: String },
}

/// Orchestrates one slip image from bytes to a terminal outcome.
///
/// Owns the ports it sequences: QR scan, vision extraction, obligation
/// resolution, reconciliation, conditional settlement. Extraction and
/// resolution run concurrently; the store's conditional `mark_paid` is the
/// only correctness mechanism against racing duplicate submissions.
pub struct SettlementPipeline {
    store: BillStoreBox,
    extractor: SlipExtractorBox,
    scanner: QrScannerBox,
    policy: PipelinePolicy,
}

impl SettlementPipeline {
    pub fn new(store: BillStoreBox, extractor: SlipExtractorBox, scanner: QrScannerBox) -> Self {
        Self::with_policy(store, extractor, scanner, PipelinePolicy::default())
    }

    pub fn with_policy(
        store: BillStoreBox,
        extractor: SlipExtractorBox,
        scanner: QrScannerBox,
        policy: PipelinePolicy,
    ) -> Self {
        Self {
            store,
            extractor,
            scanner,
            policy,
        }
    }

    pub async fn process_slip(
        &self,
        group_id: &str,
        payer_id: &str,
        image: &[u8],
    ) -> Result<SlipOutcome> {
        let qr_payload = self.scanner.scan(image)?;
        debug!(group_id, payer_id, qr_found = qr_payload.is_some(), "scanned slip image");
        if qr_payload.is_none() && self.policy.require_qr {
            info!(group_id, payer_id, "rejected image without QR payload");
            return Ok(SlipOutcome::NoQrDetected);
        }

        // The inference call is slow; resolve the obligation concurrently.
        let (extracted, pending) = tokio::join!(
            self.extractor.extract(image),
            self.resolve_pending(group_id, payer_id)
        );
        let pending = pending?;

        let record = match extracted {
            Ok(record) => record,
            Err(e) => {
                warn!(group_id, payer_id, error = %e, "slip extraction failed");
                return Ok(SlipOutcome::ExtractionFailed(e.to_string()));
            }
        };

        match reconcile(record.amount, pending.as_ref()) {
            Reconciliation::AmountMissing => Ok(SlipOutcome::AmountMissing),
            Reconciliation::NoObligation => Ok(SlipOutcome::NoPendingObligation),
            Reconciliation::Mismatch {
                bill_title,
                due,
                received,
            } => {
                info!(group_id, payer_id, %due, %received, "amount mismatch");
                Ok(SlipOutcome::Mismatch {
                    bill_title,
                    due,
                    received,
                })
            }
            Reconciliation::Confirmed {
                obligation_id,
                bill_title,
                due,
                received,
            } => {
                if self.store.mark_paid(obligation_id, Utc::now()).await? {
                    info!(group_id, payer_id, %obligation_id, "obligation settled");
                    Ok(SlipOutcome::Confirmed {
                        bill_title,
                        due,
                        received,
                    })
                } else {
                    // A concurrent submission won the conditional update.
                    Ok(SlipOutcome::AlreadyConfirmed { bill_title })
                }
            }
        }
    }

    /// Finds the single outstanding obligation this payment should satisfy,
    /// or `None` when the group has no bills, the payer has no row in the
    /// addressed bill, or that row is already paid.
    async fn resolve_pending(
        &self,
        group_id: &str,
        payer_id: &str,
    ) -> Result<Option<PendingObligation>> {
        let bill = match self.policy.resolution {
            ResolutionPolicy::LatestBill => self.store.latest_bill(group_id).await?,
        };
        let Some(bill) = bill else {
            return Ok(None);
        };
        let Some(obligation) = self.store.obligation(bill.id, payer_id).await? else {
            return Ok(None);
        };
        if obligation.is_paid() {
            return Ok(None);
        }
        Ok(Some(PendingObligation {
            obligation,
            bill_title: bill.title,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bill::{Bill, SplitPolicy};
    use crate::domain::ports::{BillStore, QrScanner, SlipExtractor};
    use crate::domain::slip::SlipRecord;
    use crate::error::ExtractError;
    use crate::infrastructure::in_memory::InMemoryBillStore;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct FakeExtractor(std::result::Result<SlipRecord, ExtractError>);

    #[async_trait]
    impl SlipExtractor for FakeExtractor {
        async fn extract(&self, _image: &[u8]) -> std::result::Result<SlipRecord, ExtractError> {
            match &self.0 {
                Ok(record) => Ok(record.clone()),
                Err(ExtractError::Backend(m)) => Err(ExtractError::Backend(m.clone())),
                Err(ExtractError::Malformed(m)) => Err(ExtractError::Malformed(m.clone())),
                Err(ExtractError::Timeout) => Err(ExtractError::Timeout),
            }
        }
    }

    struct FakeScanner(Option<String>);

    impl QrScanner for FakeScanner {
        fn scan(&self, _image: &[u8]) -> Result<Option<String>> {
            Ok(self.0.clone())
        }
    }

    fn record_with_amount(amount: rust_decimal::Decimal) -> SlipRecord {
        SlipRecord {
            amount: Some(amount),
            ..SlipRecord::default()
        }
    }

    async fn seeded_store(due_total: rust_decimal::Decimal) -> (InMemoryBillStore, uuid::Uuid) {
        let store = InMemoryBillStore::new();
        let bill = Bill::new(
            "G1",
            "Dinner",
            Amount::new(due_total).unwrap(),
            SplitPolicy::Equal,
        );
        let obligations = bill.obligations_for(&["U1".to_string()]).unwrap();
        let obligation_id = obligations[0].id;
        store.create_bill(bill, obligations).await.unwrap();
        (store, obligation_id)
    }

    fn pipeline(
        store: InMemoryBillStore,
        extractor: FakeExtractor,
        scanner: FakeScanner,
    ) -> SettlementPipeline {
        SettlementPipeline::new(Box::new(store), Box::new(extractor), Box::new(scanner))
    }

    #[tokio::test]
    async fn test_confirms_within_tolerance_and_marks_paid() {
        let (store, _) = seeded_store(dec!(300.00)).await;
        let p = pipeline(
            store.clone(),
            FakeExtractor(Ok(record_with_amount(dec!(295.00)))),
            FakeScanner(Some("payload".to_string())),
        );

        let outcome = p.process_slip("G1", "U1", b"img").await.unwrap();
        match outcome {
            SlipOutcome::Confirmed {
                bill_title,
                due,
                received,
            } => {
                assert_eq!(bill_title, "Dinner");
                assert_eq!(due.value(), dec!(300.00));
                assert_eq!(received, dec!(295.00));
            }
            other => panic!("expected confirmation, got {other:?}"),
        }

        let bill = store.latest_bill("G1").await.unwrap().unwrap();
        let row = store.obligation(bill.id, "U1").await.unwrap().unwrap();
        assert!(row.is_paid());
    }

    #[tokio::test]
    async fn test_mismatch_reports_both_figures_and_stays_unpaid() {
        let (store, _) = seeded_store(dec!(300.00)).await;
        let p = pipeline(
            store.clone(),
            FakeExtractor(Ok(record_with_amount(dec!(250.00)))),
            FakeScanner(Some("payload".to_string())),
        );

        let outcome = p.process_slip("G1", "U1", b"img").await.unwrap();
        assert_eq!(
            outcome,
            SlipOutcome::Mismatch {
                bill_title: "Dinner".to_string(),
                due: Amount::new(dec!(300.00)).unwrap(),
                received: dec!(250.00),
            }
        );

        let bill = store.latest_bill("G1").await.unwrap().unwrap();
        let row = store.obligation(bill.id, "U1").await.unwrap().unwrap();
        assert!(!row.is_paid());
    }

    #[tokio::test]
    async fn test_no_qr_short_circuits_before_extraction() {
        let (store, _) = seeded_store(dec!(300.00)).await;
        let p = pipeline(
            store,
            FakeExtractor(Err(ExtractError::Backend("must not be called".into()))),
            FakeScanner(None),
        );

        let outcome = p.process_slip("G1", "U1", b"img").await.unwrap();
        assert_eq!(outcome, SlipOutcome::NoQrDetected);
    }

    #[tokio::test]
    async fn test_advisory_qr_policy_proceeds_without_payload() {
        let (store, _) = seeded_store(dec!(300.00)).await;
        let p = SettlementPipeline::with_policy(
            Box::new(store),
            Box::new(FakeExtractor(Ok(record_with_amount(dec!(300.00))))),
            Box::new(FakeScanner(None)),
            PipelinePolicy {
                require_qr: false,
                resolution: ResolutionPolicy::LatestBill,
            },
        );

        let outcome = p.process_slip("G1", "U1", b"img").await.unwrap();
        assert!(matches!(outcome, SlipOutcome::Confirmed { .. }));
    }

    #[tokio::test]
    async fn test_missing_amount_never_reaches_reconciliation() {
        let (store, _) = seeded_store(dec!(300.00)).await;
        let p = pipeline(
            store.clone(),
            FakeExtractor(Ok(SlipRecord::default())),
            FakeScanner(Some("payload".to_string())),
        );

        let outcome = p.process_slip("G1", "U1", b"img").await.unwrap();
        assert_eq!(outcome, SlipOutcome::AmountMissing);

        let bill = store.latest_bill("G1").await.unwrap().unwrap();
        let row = store.obligation(bill.id, "U1").await.unwrap().unwrap();
        assert!(!row.is_paid());
    }

    #[tokio::test]
    async fn test_extraction_failure_surfaces_with_message() {
        let (store, _) = seeded_store(dec!(300.00)).await;
        let p = pipeline(
            store,
            FakeExtractor(Err(ExtractError::Timeout)),
            FakeScanner(Some("payload".to_string())),
        );

        let outcome = p.process_slip("G1", "U1", b"img").await.unwrap();
        match outcome {
            SlipOutcome::ExtractionFailed(msg) => {
                assert!(msg.contains("timed out"));
            }
            other => panic!("expected extraction failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_payer_has_no_pending_obligation() {
        let (store, _) = seeded_store(dec!(300.00)).await;
        let p = pipeline(
            store,
            FakeExtractor(Ok(record_with_amount(dec!(300.00)))),
            FakeScanner(Some("payload".to_string())),
        );

        let outcome = p.process_slip("G1", "U9", b"img").await.unwrap();
        assert_eq!(outcome, SlipOutcome::NoPendingObligation);
    }

    #[tokio::test]
    async fn test_group_without_bills_has_no_pending_obligation() {
        let store = InMemoryBillStore::new();
        let p = pipeline(
            store,
            FakeExtractor(Ok(record_with_amount(dec!(300.00)))),
            FakeScanner(Some("payload".to_string())),
        );

        let outcome = p.process_slip("G1", "U1", b"img").await.unwrap();
        assert_eq!(outcome, SlipOutcome::NoPendingObligation);
    }

    #[tokio::test]
    async fn test_paid_obligation_is_not_reevaluated() {
        let (store, obligation_id) = seeded_store(dec!(300.00)).await;
        store.mark_paid(obligation_id, Utc::now()).await.unwrap();

        let p = pipeline(
            store,
            FakeExtractor(Ok(record_with_amount(dec!(300.00)))),
            FakeScanner(Some("payload".to_string())),
        );

        let outcome = p.process_slip("G1", "U1", b"img").await.unwrap();
        assert_eq!(outcome, SlipOutcome::NoPendingObligation);
    }

    #[tokio::test]
    async fn test_latest_bill_shadows_older_unpaid_bill() {
        let store = InMemoryBillStore::new();
        let older = Bill::new(
            "G1",
            "Lunch",
            Amount::new(dec!(100.00)).unwrap(),
            SplitPolicy::Equal,
        );
        let older_obligations = older.obligations_for(&["U1".to_string()]).unwrap();
        store.create_bill(older, older_obligations).await.unwrap();

        let newer = Bill::new(
            "G1",
            "Dinner",
            Amount::new(dec!(300.00)).unwrap(),
            SplitPolicy::Equal,
        );
        let newer_obligations = newer.obligations_for(&["U2".to_string()]).unwrap();
        store.create_bill(newer, newer_obligations).await.unwrap();

        // U1 owes on the older bill only; under LatestBill policy a slip
        // from U1 no longer matches anything.
        let p = pipeline(
            store,
            FakeExtractor(Ok(record_with_amount(dec!(100.00)))),
            FakeScanner(Some("payload".to_string())),
        );
        let outcome = p.process_slip("G1", "U1", b"img").await.unwrap();
        assert_eq!(outcome, SlipOutcome::NoPendingObligation);
    }
}
