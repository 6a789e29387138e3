//! Messaging-transport and access-gate interfaces.
//!
//! The transport (a chat platform, in the original deployment) is an
//! external collaborator; the relay only needs the small surface modelled
//! here: incoming events, inline buttons with callback payloads, editable
//! status messages, and a membership check.

use async_trait::async_trait;
use thiserror::Error;

use crate::rendition::Tier;
use crate::session::SessionKey;

/// A user identity on the transport.
pub type UserId = i64;

/// Identifier of a message the transport can edit or delete.
pub type MessageId = i64;

/// Failure of a single transport operation (send, edit, delete).
///
/// Status-display updates are best-effort: callers log these and move on,
/// they never escalate.
#[derive(Debug, Error)]
#[error("transport operation failed: {0}")]
pub struct TransportFailure(pub String);

/// Logs and discards the outcome of a best-effort transport operation.
pub fn best_effort(what: &str, result: Result<(), TransportFailure>) {
    if let Err(e) = result {
        log::debug!("{what} skipped: {e}");
    }
}

/// Incoming events the bot routes. Each command maps to exactly one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// The `start` command.
    Start { user: UserId },
    /// The `help` command.
    Help { user: UserId },
    /// Arbitrary text, treated as a candidate media link.
    Text { user: UserId, text: String },
    /// A button press on a previously sent keyboard.
    Callback {
        user: UserId,
        /// The message the keyboard is attached to.
        message: MessageId,
        action: CallbackAction,
    },
}

/// Parsed callback-button payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// The user picked a tier for a pending session.
    SelectTier { key: SessionKey, tier: Tier },
    /// The user dismissed the pending session.
    Cancel { key: SessionKey },
}

impl CallbackAction {
    /// Encodes the action into its wire payload (`q|<key>|<tier>`,
    /// `x|<key>`).
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::SelectTier { key, tier } => format!("q|{key}|{}", tier.nominal()),
            Self::Cancel { key } => format!("x|{key}"),
        }
    }

    /// Parses a wire payload; anything malformed is `None` (stale or foreign
    /// buttons are ignored, never an error).
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        let mut parts = data.splitn(3, '|');
        match parts.next()? {
            "q" => {
                let key = parts.next().filter(|k| !k.is_empty())?.to_string();
                let tier = parts.next()?.parse().ok()?;
                Some(Self::SelectTier { key, tier })
            }
            "x" => {
                let key = parts.next().filter(|k| !k.is_empty())?.to_string();
                Some(Self::Cancel { key })
            }
            _ => None,
        }
    }
}

/// One inline button under a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Text on the button.
    pub label: String,
    /// What pressing it does.
    pub press: ButtonPress,
}

/// Effect of pressing a button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonPress {
    /// Sends a callback payload back to the bot.
    Callback(String),
    /// Opens an external link (the join prompt).
    Link(String),
}

impl Button {
    /// Builds a callback button for an action.
    #[must_use]
    pub fn action(label: impl Into<String>, action: &CallbackAction) -> Self {
        Self {
            label: label.into(),
            press: ButtonPress::Callback(action.encode()),
        }
    }

    /// Builds a link button.
    #[must_use]
    pub fn link(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            press: ButtonPress::Link(url.into()),
        }
    }
}

/// Handle to an editable status message owned by one relay operation.
#[async_trait]
pub trait StatusHandle: Send + Sync {
    /// Replaces the message text.
    ///
    /// # Errors
    ///
    /// Reports transient transport trouble; callers treat this as
    /// best-effort and skip the update.
    async fn edit(&self, text: &str) -> Result<(), TransportFailure>;

    /// Retires the message once the relay is done with it.
    ///
    /// # Errors
    ///
    /// Same best-effort policy as [`edit`](Self::edit).
    async fn delete(&self) -> Result<(), TransportFailure>;
}

/// Outbound messaging surface the bot drives.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends plain text to a user.
    ///
    /// # Errors
    ///
    /// Transport-level failure.
    async fn send_text(&self, user: UserId, text: &str) -> Result<(), TransportFailure>;

    /// Sends the tier keyboard: optional thumbnail, caption, button rows.
    ///
    /// # Errors
    ///
    /// Transport-level failure.
    async fn send_keyboard(
        &self,
        user: UserId,
        photo_url: Option<&str>,
        caption: &str,
        buttons: &[Vec<Button>],
    ) -> Result<MessageId, TransportFailure>;

    /// Creates an editable status message for progress text.
    ///
    /// # Errors
    ///
    /// Transport-level failure.
    async fn send_status(
        &self,
        user: UserId,
        text: &str,
    ) -> Result<Box<dyn StatusHandle>, TransportFailure>;

    /// Deletes a previously sent message (the keyboard, on cancel).
    ///
    /// # Errors
    ///
    /// Transport-level failure; cancel handling treats it as best-effort.
    async fn delete_message(&self, user: UserId, message: MessageId)
    -> Result<(), TransportFailure>;

    /// Shows a short notice to the user (a toast on button press).
    ///
    /// # Errors
    ///
    /// Transport-level failure.
    async fn notify(&self, user: UserId, text: &str, alert: bool) -> Result<(), TransportFailure>;
}

/// Membership check gating all bot functionality.
#[async_trait]
pub trait AccessGate: Send + Sync {
    /// True when the user may use the relay.
    async fn is_member(&self, channel: &str, user: UserId) -> bool;
}

/// Gate that admits everyone; used when no channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

#[async_trait]
impl AccessGate for OpenGate {
    async fn is_member(&self, _channel: &str, _user: UserId) -> bool {
        true
    }
}
