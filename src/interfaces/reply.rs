use crate::application::billing::BillStatus;
use crate::application::pipeline::SlipOutcome;
use crate::application::router::RouterReply;
use serde_json::{Value, json};

/// A rich-card message for the chat transport: a plain-text fallback plus
/// the structured card payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub alt_text: String,
    pub card: Value,
}

impl Reply {
    /// Renders every router reply into exactly one outbound message.
    pub fn render(reply: &RouterReply) -> Self {
        match reply {
            RouterReply::Slip(outcome) => Self::for_outcome(outcome),
            RouterReply::MemberPrompt {
                title,
                total,
                policy,
            } => Self::card(
                format!("Who shares \"{title}\"?"),
                "Select members",
                vec![
                    ("Bill", title.clone()),
                    ("Total", total.to_string()),
                    ("Split", format!("{policy:?}").to_lowercase()),
                ],
            ),
            RouterReply::BillCreated { bill, member_count } => Self::card(
                format!("Bill \"{}\" created", bill.title),
                "Bill created",
                vec![
                    ("Bill", bill.title.clone()),
                    ("Total", bill.total.to_string()),
                    ("Members", member_count.to_string()),
                ],
            ),
            RouterReply::Status(None) => Self::card(
                "No active bill".to_string(),
                "Status",
                vec![("Status", "This group has no bills yet".to_string())],
            ),
            RouterReply::Status(Some(status)) => Self::status_card(status),
        }
    }

    fn for_outcome(outcome: &SlipOutcome) -> Self {
        match outcome {
            SlipOutcome::NoQrDetected => Self::card(
                "No QR code detected".to_string(),
                "Not a payment slip?",
                vec![(
                    "Hint",
                    "Send a photo of the transfer slip with its QR code visible".to_string(),
                )],
            ),
            SlipOutcome::ExtractionFailed(message) => Self::card(
                "Could not read the slip".to_string(),
                "Please try again",
                vec![("Reason", message.clone())],
            ),
            SlipOutcome::AmountMissing => Self::card(
                "Amount not detected".to_string(),
                "Please try again",
                vec![(
                    "Hint",
                    "The transfer amount was not readable on the slip".to_string(),
                )],
            ),
            SlipOutcome::NoPendingObligation => Self::card(
                "No pending obligation found".to_string(),
                "Nothing to settle",
                vec![(
                    "Hint",
                    "You have no unpaid share on this group's current bill".to_string(),
                )],
            ),
            SlipOutcome::Mismatch {
                bill_title,
                due,
                received,
            } => Self::card(
                format!("Amount mismatch: expected {due}, received {received:.2}"),
                "Amount mismatch",
                vec![
                    ("Bill", bill_title.clone()),
                    ("Expected", due.to_string()),
                    ("Received", format!("{received:.2}")),
                ],
            ),
            SlipOutcome::Confirmed {
                bill_title,
                due,
                received,
            } => Self::card(
                format!("Payment confirmed for \"{bill_title}\""),
                "Payment confirmed",
                vec![
                    ("Bill", bill_title.clone()),
                    ("Expected", due.to_string()),
                    ("Received", format!("{received:.2}")),
                ],
            ),
            SlipOutcome::AlreadyConfirmed { bill_title } => Self::card(
                format!("\"{bill_title}\" was already confirmed"),
                "Already confirmed",
                vec![("Bill", bill_title.clone())],
            ),
        }
    }

    fn status_card(status: &BillStatus) -> Self {
        let mut rows: Vec<(&str, String)> = vec![
            ("Bill", status.bill.title.clone()),
            ("Total", status.bill.total.to_string()),
            (
                "Paid",
                format!("{}/{}", status.paid_count(), status.obligations.len()),
            ),
        ];
        for obligation in &status.obligations {
            rows.push((
                "Member",
                format!(
                    "{}: {} {}",
                    obligation.payer_id,
                    obligation.due,
                    if obligation.is_paid() { "paid" } else { "unpaid" }
                ),
            ));
        }
        Self::card(
            format!("Status of \"{}\"", status.bill.title),
            "Bill status",
            rows,
        )
    }

    fn card(alt_text: String, header: &str, rows: Vec<(&str, String)>) -> Self {
        let contents: Vec<Value> = rows
            .iter()
            .map(|(label, value)| {
                json!({
                    "type": "box",
                    "layout": "baseline",
                    "contents": [
                        {"type": "text", "text": label, "size": "sm", "flex": 2},
                        {"type": "text", "text": value, "size": "sm", "flex": 5, "wrap": true}
                    ]
                })
            })
            .collect();
        let card = json!({
            "type": "bubble",
            "header": {
                "type": "box",
                "layout": "vertical",
                "contents": [{"type": "text", "text": header, "weight": "bold", "size": "md"}]
            },
            "body": {
                "type": "box",
                "layout": "vertical",
                "spacing": "sm",
                "contents": contents
            }
        });
        Self { alt_text, card }
    }
}
