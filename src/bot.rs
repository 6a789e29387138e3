//! Event routing: commands, link submissions, and callback actions.
//!
//! Each command maps to exactly one handler arm; the match below is the
//! whole registration table.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::GateConfig;
use crate::extract::ExtractorPool;
use crate::relay::Relayer;
use crate::rendition::{RenditionMap, Tier, select};
use crate::session::{SessionKey, SessionStore};
use crate::transport::{
    AccessGate, Button, CallbackAction, ChatEvent, MessageId, Messenger, UserId, best_effort,
};
use crate::upload::Destination;
use crate::url;

const START_TEXT: &str = "\u{1f338} Quality relay\n\n\
    Send me a media link (video or Shorts) and I will ask which quality you \
    want: 360p, 480p, or 720p.\n\n\
    Note:\n\
    \u{2022} Only normal public videos work.\n\
    \u{2022} Age/geo restricted or login-required items may fail; that is a \
    restriction on the origin's side.";

const HELP_TEXT: &str = "\u{1f9ff} How to use\n\n\
    1. Send a link, for example:\n\
    https://youtu.be/abc123\n\
    or https://www.youtube.com/watch?v=abc123\n\
    2. You will get the title, a thumbnail, and quality buttons.\n\
    3. Pick 360p / 480p / 720p and the file is relayed to you.\n\n\
    \u{26a0} Restricted or anti-bot protected items cannot be relayed \
    without cookies configured on the server.";

const LINK_HINT: &str = "\u{274c} That does not look like a supported media link.\n\
    Example: https://youtu.be/abc123";

const JOIN_PROMPT: &str = "\u{26a0} Please join our channel before using the relay.";

const NO_USABLE_QUALITY: &str = "\u{274c} No usable 360p/480p/720p rendition was found \
    for this item.\nTry another link.";

/// The relay bot: wires the gate, extractor, selector, session store, and
/// orchestrator to one messaging transport.
pub struct Bot {
    messenger: Arc<dyn Messenger>,
    gate: Arc<dyn AccessGate>,
    gate_config: GateConfig,
    extractor: ExtractorPool,
    store: Arc<SessionStore>,
    relayer: Relayer,
    destination: Arc<dyn Destination>,
}

impl Bot {
    /// Creates the bot from its collaborators.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        messenger: Arc<dyn Messenger>,
        gate: Arc<dyn AccessGate>,
        gate_config: GateConfig,
        extractor: ExtractorPool,
        store: Arc<SessionStore>,
        relayer: Relayer,
        destination: Arc<dyn Destination>,
    ) -> Self {
        Self {
            messenger,
            gate,
            gate_config,
            extractor,
            store,
            relayer,
            destination,
        }
    }

    /// Routes one incoming event. Nothing here returns an error: every
    /// failure becomes a message to the user.
    pub async fn handle(&self, event: ChatEvent) {
        match event {
            ChatEvent::Start { user } => {
                if self.admitted(user).await {
                    best_effort("start reply", self.messenger.send_text(user, START_TEXT).await);
                }
            }
            ChatEvent::Help { user } => {
                if self.admitted(user).await {
                    best_effort("help reply", self.messenger.send_text(user, HELP_TEXT).await);
                }
            }
            ChatEvent::Text { user, text } => {
                if self.admitted(user).await {
                    self.handle_link(user, &text).await;
                }
            }
            ChatEvent::Callback {
                user,
                message,
                action,
            } => self.handle_callback(user, message, action).await,
        }
    }

    /// Checks the access gate; on refusal presents the join prompt.
    async fn admitted(&self, user: UserId) -> bool {
        let Some(channel) = &self.gate_config.channel else {
            return true;
        };
        if self.gate.is_member(channel, user).await {
            return true;
        }
        let join = self.gate_config.join_url().unwrap_or_default();
        let buttons = vec![vec![Button::link("\u{1f4e2} Join channel", join)]];
        best_effort(
            "join prompt",
            self.messenger
                .send_keyboard(user, None, JOIN_PROMPT, &buttons)
                .await
                .map(|_| ()),
        );
        false
    }

    async fn reply(&self, user: UserId, text: &str) {
        best_effort("reply", self.messenger.send_text(user, text).await);
    }

    /// Extraction and tier offering for a submitted link.
    async fn handle_link(&self, user: UserId, text: &str) {
        let Some(link) = url::first_media_link(text) else {
            self.reply(user, LINK_HINT).await;
            return;
        };

        let info = match self.extractor.extract(link).await {
            Ok(info) => info,
            Err(e) => {
                self.reply(user, &format!("\u{274c} Could not read media info:\n{e}"))
                    .await;
                return;
            }
        };

        let renditions = select(&info.formats);
        if renditions.is_empty() {
            self.reply(user, NO_USABLE_QUALITY).await;
            return;
        }

        let media = info.reference();
        let caption = format!("\u{1f4fa} {}\n\nChoose a quality:", media.title);
        let thumbnail = media.thumbnail_url.clone();
        let key = self.store.open(user, media, renditions.clone());
        let buttons = keyboard(&key, &renditions);

        if let Err(e) = self
            .messenger
            .send_keyboard(user, thumbnail.as_deref(), &caption, &buttons)
            .await
        {
            log::warn!("could not present tiers to user {user}: {e}");
            self.store.close(&key);
        }
    }

    async fn handle_callback(&self, user: UserId, message: MessageId, action: CallbackAction) {
        match action {
            CallbackAction::Cancel { key } => match self.store.resolve(&key, user) {
                Ok(_) => {
                    self.store.close(&key);
                    best_effort(
                        "cancel ack",
                        self.messenger.notify(user, "Cancelled.", false).await,
                    );
                    best_effort(
                        "keyboard removal",
                        self.messenger.delete_message(user, message).await,
                    );
                }
                Err(e) => {
                    best_effort(
                        "cancel rejection",
                        self.messenger.notify(user, &e.to_string(), true).await,
                    );
                }
            },
            CallbackAction::SelectTier { key, tier } => {
                // Validate now for a quick toast; the orchestrator resolves
                // again when it actually starts (re-resolution is allowed
                // until the key is closed).
                let resolved = match self.store.resolve(&key, user) {
                    Ok(resolved) => resolved,
                    Err(e) => {
                        best_effort(
                            "selection rejection",
                            self.messenger.notify(user, &e.to_string(), true).await,
                        );
                        return;
                    }
                };
                if !resolved.renditions.contains_key(&tier) {
                    best_effort(
                        "selection rejection",
                        self.messenger
                            .notify(user, &format!("{tier} is not available for this item"), true)
                            .await,
                    );
                    return;
                }

                best_effort(
                    "selection ack",
                    self.messenger
                        .notify(user, &format!("{tier} selected, downloading\u{2026}"), false)
                        .await,
                );
                let status = match self
                    .messenger
                    .send_status(user, "\u{2b07} Download starting\u{2026}")
                    .await
                {
                    Ok(status) => status,
                    Err(e) => {
                        log::warn!("no status message for user {user}, dropping relay: {e}");
                        return;
                    }
                };

                let cancel = CancellationToken::new();
                let state = self
                    .relayer
                    .run(
                        user,
                        &key,
                        tier,
                        self.destination.as_ref(),
                        status.as_ref(),
                        &cancel,
                    )
                    .await;
                log::info!("relay for user {user} finished in state {state:?}");
            }
        }
    }
}

/// Button rows for a fresh session: available tiers, then a cancel row.
fn keyboard(key: &SessionKey, renditions: &RenditionMap) -> Vec<Vec<Button>> {
    let tier_row: Vec<Button> = Tier::ALL
        .iter()
        .filter(|tier| renditions.contains_key(tier))
        .map(|tier| {
            Button::action(
                tier.to_string(),
                &CallbackAction::SelectTier {
                    key: key.clone(),
                    tier: *tier,
                },
            )
        })
        .collect();

    let cancel_row = vec![Button::action(
        "\u{274c} Cancel",
        &CallbackAction::Cancel { key: key.clone() },
    )];

    if tier_row.is_empty() {
        vec![cancel_row]
    } else {
        vec![tier_row, cancel_row]
    }
}
