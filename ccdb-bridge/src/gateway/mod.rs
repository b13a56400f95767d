//! The Discord transport seam.
//!
//! The core never talks to the wire client directly: every send, edit,
//! delete, thread creation and reaction goes through the [`Gateway`] trait.
//! [`DiscordGateway`] is the real implementation; [`MockGateway`] records
//! calls for tests.

pub mod discord;
pub mod mock;

pub use discord::DiscordGateway;
pub use mock::{MockGateway, MockMessage};

use async_trait::async_trait;

use crate::errors::Result;

/// Opaque handle to a sent Discord message, used for later edits/deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel_id: i64,
    pub message_id: i64,
}

/// A renderable embed. Converted to the wire client's builder at the edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<u32>,
    pub footer: Option<String>,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }
}

/// Visual style of a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    Primary,
    Secondary,
    Danger,
}

/// One button in a component row.
#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub custom_id: String,
    pub label: String,
    pub style: ButtonKind,
    pub disabled: bool,
}

/// One entry of a select menu.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
    pub description: Option<String>,
}

/// One row of interactive controls under a message.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentRow {
    Buttons(Vec<Button>),
    Select {
        custom_id: String,
        placeholder: String,
        min_values: u8,
        max_values: u8,
        options: Vec<SelectOption>,
    },
}

/// An outbound message, or an edit patch.
///
/// On edits, `None` fields are left untouched; `components: Some(vec![])`
/// strips all controls and `clear_embed` removes embeds.
#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    pub content: Option<String>,
    pub embed: Option<Embed>,
    pub components: Option<Vec<ComponentRow>>,
    pub clear_embed: bool,
}

impl OutboundMessage {
    /// Plain text message.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Embed-only message.
    pub fn embed(embed: Embed) -> Self {
        Self {
            embed: Some(embed),
            ..Self::default()
        }
    }

    pub fn with_components(mut self, components: Vec<ComponentRow>) -> Self {
        self.components = Some(components);
        self
    }

    pub fn with_clear_embed(mut self) -> Self {
        self.clear_embed = true;
        self
    }
}

/// Everything the bridge needs from the Discord transport.
///
/// Channel and thread ids share one id space on the wire, so both are plain
/// `i64` here; threads are just channels that were created via
/// [`Gateway::create_thread`].
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send a message into a channel or thread.
    async fn send_message(&self, channel_id: i64, message: OutboundMessage) -> Result<MessageRef>;

    /// Apply an edit patch to an existing message.
    async fn edit_message(&self, target: MessageRef, message: OutboundMessage) -> Result<()>;

    /// Delete a message.
    async fn delete_message(&self, target: MessageRef) -> Result<()>;

    /// Create a thread in a channel, optionally attached to an existing
    /// message. Returns the new thread id.
    async fn create_thread(
        &self,
        channel_id: i64,
        name: &str,
        from_message: Option<MessageRef>,
    ) -> Result<i64>;

    /// Add a unicode emoji reaction.
    async fn add_reaction(&self, target: MessageRef, emoji: &str) -> Result<()>;

    /// Remove the bot's own unicode emoji reaction.
    async fn remove_reaction(&self, target: MessageRef, emoji: &str) -> Result<()>;
}
