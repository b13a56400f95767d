//! serenity-backed [`Gateway`] implementation.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    ButtonStyle, ChannelId, ChannelType, Colour, CreateActionRow, CreateButton, CreateEmbed,
    CreateEmbedFooter, CreateMessage, CreateSelectMenu, CreateSelectMenuKind,
    CreateSelectMenuOption, CreateThread, EditMessage, MessageId, ReactionType,
};
use serenity::http::Http;

use super::{Button, ButtonKind, ComponentRow, Embed, Gateway, MessageRef, OutboundMessage};
use crate::errors::Result;

/// [`Gateway`] backed by the serenity HTTP client.
pub struct DiscordGateway {
    http: Arc<Http>,
}

impl DiscordGateway {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Gateway for DiscordGateway {
    async fn send_message(&self, channel_id: i64, message: OutboundMessage) -> Result<MessageRef> {
        let mut builder = CreateMessage::new();
        if let Some(content) = message.content {
            builder = builder.content(content);
        }
        if let Some(embed) = &message.embed {
            builder = builder.embed(to_create_embed(embed));
        }
        if let Some(rows) = &message.components {
            builder = builder.components(to_action_rows(rows));
        }

        let sent = ChannelId::new(channel_id as u64)
            .send_message(&self.http, builder)
            .await?;
        Ok(MessageRef {
            channel_id,
            message_id: sent.id.get() as i64,
        })
    }

    async fn edit_message(&self, target: MessageRef, message: OutboundMessage) -> Result<()> {
        let mut builder = EditMessage::new();
        if let Some(content) = message.content {
            builder = builder.content(content);
        }
        if let Some(embed) = &message.embed {
            builder = builder.embed(to_create_embed(embed));
        } else if message.clear_embed {
            builder = builder.embeds(Vec::new());
        }
        if let Some(rows) = &message.components {
            builder = builder.components(to_action_rows(rows));
        }

        ChannelId::new(target.channel_id as u64)
            .edit_message(&self.http, MessageId::new(target.message_id as u64), builder)
            .await?;
        Ok(())
    }

    async fn delete_message(&self, target: MessageRef) -> Result<()> {
        ChannelId::new(target.channel_id as u64)
            .delete_message(&self.http, MessageId::new(target.message_id as u64))
            .await?;
        Ok(())
    }

    async fn create_thread(
        &self,
        channel_id: i64,
        name: &str,
        from_message: Option<MessageRef>,
    ) -> Result<i64> {
        let channel = ChannelId::new(channel_id as u64);
        // Thread names cap at 100 chars on the wire.
        let name: String = name.chars().take(100).collect();
        let thread = match from_message {
            Some(msg) => {
                channel
                    .create_thread_from_message(
                        &self.http,
                        MessageId::new(msg.message_id as u64),
                        CreateThread::new(name),
                    )
                    .await?
            },
            None => {
                channel
                    .create_thread(
                        &self.http,
                        CreateThread::new(name).kind(ChannelType::PublicThread),
                    )
                    .await?
            },
        };
        Ok(thread.id.get() as i64)
    }

    async fn add_reaction(&self, target: MessageRef, emoji: &str) -> Result<()> {
        self.http
            .create_reaction(
                ChannelId::new(target.channel_id as u64),
                MessageId::new(target.message_id as u64),
                &ReactionType::Unicode(emoji.to_string()),
            )
            .await?;
        Ok(())
    }

    async fn remove_reaction(&self, target: MessageRef, emoji: &str) -> Result<()> {
        self.http
            .delete_reaction_me(
                ChannelId::new(target.channel_id as u64),
                MessageId::new(target.message_id as u64),
                &ReactionType::Unicode(emoji.to_string()),
            )
            .await?;
        Ok(())
    }
}

/// Convert our embed value into the serenity builder.
pub fn to_create_embed(embed: &Embed) -> CreateEmbed {
    let mut builder = CreateEmbed::new();
    if let Some(title) = &embed.title {
        builder = builder.title(title.clone());
    }
    if let Some(description) = &embed.description {
        builder = builder.description(description.clone());
    }
    if let Some(color) = embed.color {
        builder = builder.colour(Colour::new(color));
    }
    if let Some(footer) = &embed.footer {
        builder = builder.footer(CreateEmbedFooter::new(footer.clone()));
    }
    builder
}

/// Convert component rows into serenity action rows.
pub fn to_action_rows(rows: &[ComponentRow]) -> Vec<CreateActionRow> {
    rows.iter()
        .map(|row| match row {
            ComponentRow::Buttons(buttons) => {
                CreateActionRow::Buttons(buttons.iter().map(to_create_button).collect())
            },
            ComponentRow::Select {
                custom_id,
                placeholder,
                min_values,
                max_values,
                options,
            } => {
                let kind = CreateSelectMenuKind::String {
                    options: options
                        .iter()
                        .map(|opt| {
                            let mut o =
                                CreateSelectMenuOption::new(opt.label.clone(), opt.value.clone());
                            if let Some(description) = &opt.description {
                                o = o.description(description.clone());
                            }
                            o
                        })
                        .collect(),
                };
                let menu = CreateSelectMenu::new(custom_id.clone(), kind)
                    .placeholder(placeholder.clone())
                    .min_values(*min_values)
                    .max_values(*max_values);
                CreateActionRow::SelectMenu(menu)
            },
        })
        .collect()
}

fn to_create_button(button: &Button) -> CreateButton {
    let style = match button.style {
        ButtonKind::Primary => ButtonStyle::Primary,
        ButtonKind::Secondary => ButtonStyle::Secondary,
        ButtonKind::Danger => ButtonStyle::Danger,
    };
    CreateButton::new(button.custom_id.clone())
        .label(button.label.clone())
        .style(style)
        .disabled(button.disabled)
}
