use crate::application::billing::{BillStatus, BillingService};
use crate::application::pipeline::{SettlementPipeline, SlipOutcome};
use crate::application::session::{BillDraft, DraftSessions};
use crate::domain::bill::{Bill, SplitPolicy};
use crate::domain::event::InboundEvent;
use crate::domain::money::Amount;
use crate::domain::ports::MessageContentBox;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;

/// What the transport should send back for one handled event. `None` from
/// the router means the event was a defined no-op.
#[derive(Debug, Clone, PartialEq)]
pub enum RouterReply {
    Slip(SlipOutcome),
    /// A draft was started; prompt the creator to select members.
    MemberPrompt {
        title: String,
        total: Amount,
        policy: SplitPolicy,
    },
    BillCreated {
        bill: Bill,
        member_count: usize,
    },
    Status(Option<BillStatus>),
}

#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum PostbackAction {
    ConfirmMembers { members: Vec<String> },
}

/// Dispatches every inbound event kind to exactly one handler.
pub struct EventRouter {
    billing: BillingService,
    pipeline: SettlementPipeline,
    sessions: DraftSessions,
    content: MessageContentBox,
}

impl EventRouter {
    pub fn new(
        billing: BillingService,
        pipeline: SettlementPipeline,
        sessions: DraftSessions,
        content: MessageContentBox,
    ) -> Self {
        Self {
            billing,
            pipeline,
            sessions,
            content,
        }
    }

    pub async fn handle(&self, event: InboundEvent) -> Result<Option<RouterReply>> {
        match event {
            InboundEvent::TextCommand {
                group_id,
                user_id,
                text,
            } => self.handle_text(&group_id, &user_id, &text).await,
            InboundEvent::Image {
                group_id,
                user_id,
                message_id,
            } => {
                let image = self.content.fetch(&message_id).await?;
                let outcome = self.pipeline.process_slip(&group_id, &user_id, &image).await?;
                Ok(Some(RouterReply::Slip(outcome)))
            }
            InboundEvent::Postback {
                group_id,
                user_id,
                data,
            } => self.handle_postback(&group_id, &user_id, &data).await,
        }
    }

    async fn handle_text(
        &self,
        group_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<Option<RouterReply>> {
        if text.trim() == "/status" {
            let status = self.billing.bill_status(group_id).await?;
            return Ok(Some(RouterReply::Status(status)));
        }
        if let Some((title, total, policy)) = parse_bill_command(text) {
            let Ok(total) = Amount::new(total) else {
                // Zero or negative totals are ignored like any other chatter.
                return Ok(None);
            };
            self.sessions
                .begin(BillDraft {
                    group_id: group_id.to_string(),
                    creator_id: user_id.to_string(),
                    title: title.clone(),
                    total,
                    policy,
                })
                .await;
            return Ok(Some(RouterReply::MemberPrompt {
                title,
                total,
                policy,
            }));
        }
        // Ordinary group chatter.
        Ok(None)
    }

    async fn handle_postback(
        &self,
        group_id: &str,
        user_id: &str,
        data: &str,
    ) -> Result<Option<RouterReply>> {
        let Ok(action) = serde_json::from_str::<PostbackAction>(data) else {
            debug!(group_id, user_id, "ignoring unrecognised postback");
            return Ok(None);
        };
        match action {
            PostbackAction::ConfirmMembers { members } => {
                let Some(draft) = self.sessions.take(group_id, user_id).await else {
                    debug!(group_id, user_id, "postback without a pending draft");
                    return Ok(None);
                };
                let bill = self
                    .billing
                    .create_bill(
                        group_id,
                        &draft.title,
                        draft.total.value(),
                        draft.policy,
                        &members,
                    )
                    .await?;
                Ok(Some(RouterReply::BillCreated {
                    bill,
                    member_count: members.len(),
                }))
            }
        }
    }
}

/// Parses `/bill <title...> <total> [equal|each]`. The title may span
/// several words; the policy defaults to an equal split.
fn parse_bill_command(text: &str) -> Option<(String, Decimal, SplitPolicy)> {
    let mut tokens: Vec<&str> = text.trim().split_whitespace().collect();
    if tokens.first() != Some(&"/bill") || tokens.len() < 3 {
        return None;
    }
    tokens.remove(0);

    let policy = match tokens.last() {
        Some(&"equal") => {
            tokens.pop();
            SplitPolicy::Equal
        }
        Some(&"each") => {
            tokens.pop();
            SplitPolicy::Each
        }
        _ => SplitPolicy::Equal,
    };

    let total = Decimal::from_str(tokens.pop()?).ok()?;
    if tokens.is_empty() {
        return None;
    }
    Some((tokens.join(" "), total, policy))
}
