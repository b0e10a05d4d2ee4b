use crate::domain::bill::PendingObligation;
use crate::domain::money::Amount;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Allowed deviation between the extracted and the due amount, as a fraction
/// of the due amount. Tolerates rounding and transfer-fee deltas while still
/// catching wrong-bill or wrong-amount slips.
pub const AMOUNT_TOLERANCE: Decimal = dec!(0.05);

/// Outcome of matching an extracted payment amount against an obligation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Amounts match within tolerance; settle this obligation.
    Confirmed {
        obligation_id: Uuid,
        bill_title: String,
        due: Amount,
        received: Decimal,
    },
    /// Extraction produced no usable amount.
    AmountMissing,
    /// No pending obligation to match against.
    NoObligation,
    /// Amount present but outside tolerance; both figures are reported so
    /// the user can self-correct.
    Mismatch {
        bill_title: String,
        due: Amount,
        received: Decimal,
    },
}

/// Decides whether an extracted amount settles a pending obligation.
///
/// Pure: no store access, no side effects. The tolerance is one-sided
/// absolute difference against 5% of the due amount; there is no
/// partial-payment concept, the full due amount (within tolerance) is
/// required.
pub fn reconcile(extracted: Option<Decimal>, pending: Option<&PendingObligation>) -> Reconciliation {
    let Some(received) = extracted else {
        return Reconciliation::AmountMissing;
    };
    let Some(pending) = pending else {
        return Reconciliation::NoObligation;
    };

    let due = pending.obligation.due;
    if (received - due.value()).abs() <= AMOUNT_TOLERANCE * due.value() {
        Reconciliation::Confirmed {
            obligation_id: pending.obligation.id,
            bill_title: pending.bill_title.clone(),
            due,
            received,
        }
    } else {
        Reconciliation::Mismatch {
            bill_title: pending.bill_title.clone(),
            due,
            received,
        }
    }
}
