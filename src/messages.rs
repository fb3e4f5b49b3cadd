use crate::results::{ClassifiedLink, TabId};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Messages exchanged between the page, background and popup contexts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuntimeMessage {
    /// page → background: result of one detection pass
    FoundPolicies {
        urls: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Vec<ClassifiedLink>>,
    },

    /// popup → background: cached link set of a tab
    #[serde(rename_all = "camelCase")]
    GetPolicies { tab_id: TabId },

    /// popup → page: is a detector resident?
    Ping,

    /// popup → page: run detection again
    DetectPolicies,
}

impl RuntimeMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeMessage::FoundPolicies { .. } => "foundPolicies",
            RuntimeMessage::GetPolicies { .. } => "getPolicies",
            RuntimeMessage::Ping => "ping",
            RuntimeMessage::DetectPolicies => "detectPolicies",
        }
    }
}

/// Replies to the request-style messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuntimeResponse {
    Policies { urls: Vec<String> },
    Pong { active: bool },
    Detection { success: bool },
}

/// A message in flight, with the tab it came from and where to reply
#[derive(Debug)]
pub struct Envelope {
    pub message: RuntimeMessage,

    /// Set by the host when the sender is a page context
    pub sender_tab: Option<TabId>,

    pub reply: Option<oneshot::Sender<RuntimeResponse>>,
}

impl Envelope {
    /// A message that expects no answer
    pub fn notify(message: RuntimeMessage, sender_tab: Option<TabId>) -> Self {
        Self {
            message,
            sender_tab,
            reply: None,
        }
    }

    /// A message paired with the receiving half of its reply channel
    pub fn request(message: RuntimeMessage) -> (Self, oneshot::Receiver<RuntimeResponse>) {
        let (tx, rx) = oneshot::channel();
        let envelope = Self {
            message,
            sender_tab: None,
            reply: Some(tx),
        };
        (envelope, rx)
    }

    /// Answer the sender; a requester that stopped waiting is not an error
    pub fn respond(&mut self, response: RuntimeResponse) {
        if let Some(reply) = self.reply.take() {
            if reply.send(response).is_err() {
                ::log::debug!("Requester for {} went away before the reply", self.message.kind());
            }
        }
    }
}
