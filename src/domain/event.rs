/// The closed set of chat events the router dispatches on.
///
/// Anything the platform sends that does not map onto one of these kinds is
/// dropped at the webhook parsing boundary; every kind listed here has a
/// defined handler, including no-ops for unrecognised payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A plain text message, potentially a bot command.
    TextCommand {
        group_id: String,
        user_id: String,
        text: String,
    },
    /// An image message; the bytes are fetched by message id from the
    /// platform's content API.
    Image {
        group_id: String,
        user_id: String,
        message_id: String,
    },
    /// A postback action from an interactive reply card.
    Postback {
        group_id: String,
        user_id: String,
        data: String,
    },
}

impl InboundEvent {
    pub fn group_id(&self) -> &str {
        match self {
            Self::TextCommand { group_id, .. }
            | Self::Image { group_id, .. }
            | Self::Postback { group_id, .. } => group_id,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Self::TextCommand { user_id, .. }
            | Self::Image { user_id, .. }
            | Self::Postback { user_id, .. } => user_id,
        }
    }
}
