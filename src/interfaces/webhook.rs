use crate::domain::event::InboundEvent;
use crate::error::{Result, SettleError};
use serde::Deserialize;

#[derive(Deserialize)]
struct WebhookBody {
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    source: Option<RawSource>,
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    postback: Option<RawPostback>,
}

#[derive(Deserialize)]
struct RawSource {
    #[serde(rename = "groupId", default)]
    group_id: Option<String>,
    #[serde(rename = "userId", default)]
    user_id: Option<String>,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct RawPostback {
    data: String,
}

/// Parses a chat-platform webhook body into the closed set of events the
/// router handles. Events of any other kind, and events outside a group
/// context, are dropped here.
pub fn parse_events(body: &str) -> Result<Vec<InboundEvent>> {
    let body: WebhookBody = serde_json::from_str(body)
        .map_err(|e| SettleError::Validation(format!("Invalid webhook body: {e}")))?;
    Ok(body.events.into_iter().filter_map(into_event).collect())
}

fn into_event(raw: RawEvent) -> Option<InboundEvent> {
    let source = raw.source?;
    let group_id = source.group_id?;
    let user_id = source.user_id?;

    match raw.kind.as_str() {
        "message" => {
            let message = raw.message?;
            match message.kind.as_str() {
                "text" => Some(InboundEvent::TextCommand {
                    group_id,
                    user_id,
                    text: message.text?,
                }),
                "image" => Some(InboundEvent::Image {
                    group_id,
                    user_id,
                    message_id: message.id?,
                }),
                _ => None,
            }
        }
        "postback" => Some(InboundEvent::Postback {
            group_id,
            user_id,
            data: raw.postback?.data,
        }),
        _ => None,
    }
}
