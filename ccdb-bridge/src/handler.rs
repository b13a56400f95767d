//! serenity event handler: routes messages, component clicks, modals and
//! slash commands into the supervisor, and wires the runtime together once
//! the gateway is ready.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serenity::all::{
    ActionRowComponent, Channel, ChannelId, ChannelType, Command, CommandDataOptionValue,
    CommandInteraction, CommandOptionType, ComponentInteraction, ComponentInteractionDataKind,
    Context, CreateActionRow, CreateAutocompleteResponse, CreateCommand, CreateCommandOption,
    CreateInputText, CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, CreateModal, EventHandler, InputTextStyle, Interaction,
    Message, ModalInteraction, Ready,
};
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use ccdb_runner::{ClaudeRunner, RunnerOptions, find_claude_cli};

use crate::api::{self, ApiState};
use crate::ask::{AnswerBus, AskComponent, AskViewRegistry};
use crate::config::Settings;
use crate::coordination::CoordinationService;
use crate::db::{
    LoungeRepository, NotificationRepository, PendingAskRepository, PendingResumeRepository,
    SessionRepository, SettingsRepository, TaskRepository,
};
use crate::gateway::Gateway;
use crate::gateway::discord::{DiscordGateway, to_action_rows, to_create_embed};
use crate::registry::SessionRegistry;
use crate::scheduler::Scheduler;
use crate::skills::{
    SkillMeta, autocomplete_label, default_skills_dir, is_valid_skill_name, load_skills,
    matching_skills, skills_overview,
};
use crate::supervisor::{ChatSupervisor, SupervisorDeps};
use crate::ui::chunker::chunk_message;
use crate::ui::embeds::{relay_sent_embed, stopped_embed};
use crate::ui::stop::StopControl;

// Attachment filtering: only small text-like files ride along as prompt
// context; everything else is silently skipped.
const ALLOWED_MIME_PREFIXES: [&str; 3] = ["text/", "application/json", "application/xml"];
const MAX_ATTACHMENT_BYTES: u32 = 50_000;
const MAX_TOTAL_BYTES: u32 = 100_000;
const MAX_ATTACHMENTS: usize = 5;

const SESSION_ENDED_NOTE: &str =
    "⚠️ This question's session has ended. Send a new message to continue.";

struct RuntimeState {
    supervisor: Arc<ChatSupervisor>,
    gateway: Arc<dyn Gateway>,
    bus: Arc<AnswerBus>,
    ask_views: Arc<AskViewRegistry>,
    skills: Vec<SkillMeta>,
}

/// The bot: constructed before the Discord client, completed on `ready`
/// (the supervisor needs the live HTTP handle).
pub struct Bridge {
    settings: Arc<Settings>,
    sessions_pool: SqlitePool,
    tasks_pool: SqlitePool,
    runtime: OnceLock<Arc<RuntimeState>>,
}

impl Bridge {
    pub fn new(settings: Arc<Settings>, sessions_pool: SqlitePool, tasks_pool: SqlitePool) -> Self {
        Self {
            settings,
            sessions_pool,
            tasks_pool,
            runtime: OnceLock::new(),
        }
    }

    fn build_runner_options(&self) -> RunnerOptions {
        let claude = &self.settings.claude;
        // An explicit CLAUDE_COMMAND wins; otherwise discover the CLI.
        let command = if claude.command == "claude" {
            find_claude_cli()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|_| claude.command.clone())
        } else {
            claude.command.clone()
        };

        let mut builder = RunnerOptions::builder()
            .command(command)
            .model(claude.model.clone())
            .permission_mode(claude.permission_mode.clone())
            .timeout_seconds(claude.timeout_seconds);
        if let Some(dir) = &claude.working_dir {
            builder = builder.working_dir(dir.clone());
        }
        if self.settings.api.enabled {
            builder = builder.api_port(self.settings.api.port);
            if let Some(secret) = &self.settings.api.secret {
                builder = builder.api_secret(secret.clone());
            }
        }
        builder.build()
    }

    /// Build the runtime on first ready; reconnects reuse it.
    async fn initialize(&self, ctx: &Context) -> Arc<RuntimeState> {
        if let Some(runtime) = self.runtime.get() {
            return runtime.clone();
        }

        let gateway: Arc<dyn Gateway> = Arc::new(DiscordGateway::new(ctx.http.clone()));
        let registry = Arc::new(SessionRegistry::new());
        let bus = Arc::new(AnswerBus::new());
        let ask_views = Arc::new(AskViewRegistry::new());

        // Stored settings win over the environment, so knobs tuned at
        // runtime survive restarts without touching the deployment.
        let settings_repo = SettingsRepository::new(self.sessions_pool.clone());
        let mut runner_options = self.build_runner_options();
        if let Ok(Some(model)) = settings_repo.get("model").await {
            info!("Using stored model override: {model}");
            runner_options.model = model;
        }
        if let Ok(Some(mode)) = settings_repo.get("permission_mode").await {
            info!("Using stored permission-mode override: {mode}");
            runner_options.permission_mode = mode;
        }
        let base_runner = Arc::new(ClaudeRunner::new(runner_options));

        let sessions = SessionRepository::new(self.sessions_pool.clone());
        let ask_repo = PendingAskRepository::new(self.sessions_pool.clone());
        let resume_repo = PendingResumeRepository::new(self.sessions_pool.clone());
        let lounge_repo = LoungeRepository::new(self.sessions_pool.clone());
        let notifications = NotificationRepository::new(self.sessions_pool.clone());
        let task_repo = TaskRepository::new(self.tasks_pool.clone());

        let coordination = CoordinationService::new(
            gateway.clone(),
            self.settings.discord.coordination_channel_id,
        );

        let supervisor = ChatSupervisor::new(SupervisorDeps {
            gateway: gateway.clone(),
            settings: self.settings.clone(),
            base_runner: base_runner.clone(),
            registry: registry.clone(),
            sessions,
            ask_repo,
            resume_repo,
            lounge_repo: Some(lounge_repo.clone()),
            bus: bus.clone(),
            ask_views: ask_views.clone(),
            coordination,
        });

        let skills = default_skills_dir()
            .map(|dir| load_skills(&dir))
            .unwrap_or_default();

        let runtime = Arc::new(RuntimeState {
            supervisor: supervisor.clone(),
            gateway: gateway.clone(),
            bus,
            ask_views,
            skills,
        });
        // A reconnect racing the first ready loses here and reuses the
        // winner's runtime without re-running the side effects below.
        if self.runtime.set(runtime.clone()).is_err() {
            return self.runtime.get().cloned().unwrap_or(runtime);
        }

        // First-time side effects only below this point.
        supervisor.startup_cleanup().await;

        Scheduler::new(
            gateway.clone(),
            task_repo.clone(),
            notifications.clone(),
            base_runner,
            registry,
            Some(self.settings.claude.context_window),
        )
        .spawn();

        if self.settings.api.enabled {
            let state = Arc::new(ApiState {
                gateway,
                notifications,
                tasks: Some(task_repo),
                lounge: Some(lounge_repo),
                default_channel_id: Some(self.settings.discord.channel_id),
                lounge_channel_id: self.settings.discord.coordination_channel_id,
                secret: self.settings.api.secret.clone(),
            });
            if let Err(e) = api::serve(state, &self.settings.api.host, self.settings.api.port).await
            {
                error!("Failed to start the REST API: {e}");
            }
        }

        if let Err(e) = Command::set_global_commands(
            &ctx.http,
            vec![
                CreateCommand::new("stop")
                    .description("Stop the active session (session is preserved)"),
                CreateCommand::new("clear")
                    .description("Reset the Claude Code session for this thread"),
                CreateCommand::new("skill")
                    .description("Run a Claude Code skill")
                    .add_option(
                        CreateCommandOption::new(
                            CommandOptionType::String,
                            "name",
                            "Skill name (type to filter)",
                        )
                        .required(true)
                        .set_autocomplete(true),
                    ),
                CreateCommand::new("skills").description("List available Claude Code skills"),
                CreateCommand::new("relay")
                    .description("Send a message to another Claude thread, triggering its session")
                    .add_option(
                        CreateCommandOption::new(
                            CommandOptionType::Channel,
                            "target",
                            "The target thread to relay the message to",
                        )
                        .channel_types(vec![ChannelType::PublicThread, ChannelType::PrivateThread])
                        .required(true),
                    )
                    .add_option(
                        CreateCommandOption::new(
                            CommandOptionType::String,
                            "message",
                            "The message to send to the target thread",
                        )
                        .required(true),
                    ),
            ],
        )
        .await
        {
            warn!("Failed to sync slash commands: {e}");
        }

        runtime
    }

    fn user_allowed(&self, user_id: i64) -> bool {
        match &self.settings.discord.allowed_user_ids {
            Some(allowed) => allowed.contains(&user_id),
            None => true,
        }
    }

    /// The prompt is the message content plus any eligible text attachments.
    async fn build_prompt(&self, message: &Message) -> String {
        let mut prompt = message.content.clone();
        if message.attachments.is_empty() {
            return prompt;
        }

        let mut total_bytes: u32 = 0;
        for attachment in message.attachments.iter().take(MAX_ATTACHMENTS) {
            if attachment.size > MAX_ATTACHMENT_BYTES {
                debug!(
                    "Skipping attachment {}: too large ({} bytes)",
                    attachment.filename, attachment.size
                );
                continue;
            }
            let content_type = attachment.content_type.as_deref().unwrap_or_default();
            if !ALLOWED_MIME_PREFIXES
                .iter()
                .any(|prefix| content_type.starts_with(prefix))
            {
                debug!(
                    "Skipping attachment {}: unsupported type {content_type}",
                    attachment.filename
                );
                continue;
            }
            total_bytes += attachment.size;
            if total_bytes > MAX_TOTAL_BYTES {
                debug!("Stopping attachment processing: total size exceeded");
                break;
            }
            match attachment.download().await {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    prompt.push_str(&format!(
                        "\n\n--- Attached file: {} ---\n{text}",
                        attachment.filename
                    ));
                },
                Err(e) => debug!("Failed to read attachment {}: {e}", attachment.filename),
            }
        }

        prompt
    }

    async fn handle_stop_click(
        &self,
        ctx: &Context,
        component: &ComponentInteraction,
        thread_id: i64,
    ) {
        let entry = self
            .runtime
            .get()
            .and_then(|runtime| runtime.supervisor.runs().get(thread_id));
        let Some(entry) = entry else {
            let _ = component
                .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
                .await;
            return;
        };

        let first_click = entry
            .stop
            .as_ref()
            .map(|stop| stop.mark_stopped())
            .unwrap_or(false);
        if !first_click {
            // Idempotent: a second click is only a deferral.
            let _ = component
                .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
                .await;
            return;
        }

        let disabled = CreateInteractionResponseMessage::new()
            .components(to_action_rows(&[StopControl::row(thread_id, true)]));
        let _ = component
            .create_response(&ctx.http, CreateInteractionResponse::UpdateMessage(disabled))
            .await;

        entry.runner.interrupt().await;

        let _ = component
            .create_followup(
                &ctx.http,
                CreateInteractionResponseFollowup::new().embed(to_create_embed(&stopped_embed())),
            )
            .await;
    }

    async fn handle_ask_component(&self, ctx: &Context, component: &ComponentInteraction) {
        let Some(parsed) = AskComponent::parse(&component.data.custom_id) else {
            return;
        };
        let Some(runtime) = self.runtime.get() else {
            return;
        };

        match parsed {
            AskComponent::Option { thread_id, index } => {
                let label = runtime.ask_views.label_for(thread_id, index);
                let _ = component
                    .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
                    .await;
                let delivered = match label {
                    Some(label) => runtime.bus.post_answer(thread_id, vec![label]),
                    None => false,
                };
                if !delivered {
                    self.session_ended_followup(ctx, component).await;
                }
            },
            AskComponent::Select { thread_id } => {
                let values = match &component.data.kind {
                    ComponentInteractionDataKind::StringSelect { values } => values.clone(),
                    _ => Vec::new(),
                };
                let _ = component
                    .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
                    .await;
                if !runtime.bus.post_answer(thread_id, values) {
                    self.session_ended_followup(ctx, component).await;
                }
            },
            AskComponent::Other { thread_id } => {
                let modal = CreateModal::new(AskComponent::modal_id(thread_id), "Your answer")
                    .components(vec![CreateActionRow::InputText(
                        CreateInputText::new(InputTextStyle::Paragraph, "Your answer", "answer")
                            .placeholder("Type your answer here...")
                            .required(true),
                    )]);
                let _ = component
                    .create_response(&ctx.http, CreateInteractionResponse::Modal(modal))
                    .await;
            },
            AskComponent::Modal { .. } => {},
        }
    }

    async fn session_ended_followup(&self, ctx: &Context, component: &ComponentInteraction) {
        let _ = component
            .create_followup(
                &ctx.http,
                CreateInteractionResponseFollowup::new()
                    .content(SESSION_ENDED_NOTE)
                    .ephemeral(true),
            )
            .await;
    }

    async fn handle_modal(&self, ctx: &Context, modal: &ModalInteraction) {
        let Some(AskComponent::Modal { thread_id }) = AskComponent::parse(&modal.data.custom_id)
        else {
            return;
        };

        let mut answer: Option<String> = None;
        for row in &modal.data.components {
            for component in &row.components {
                if let ActionRowComponent::InputText(input) = component
                    && let Some(value) = &input.value
                    && !value.is_empty()
                {
                    answer = Some(value.clone());
                }
            }
        }

        let _ = modal
            .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
            .await;

        let delivered = match (self.runtime.get(), answer) {
            (Some(runtime), Some(answer)) => runtime.bus.post_answer(thread_id, vec![answer]),
            _ => false,
        };
        if !delivered {
            let _ = modal
                .create_followup(
                    &ctx.http,
                    CreateInteractionResponseFollowup::new()
                        .content(SESSION_ENDED_NOTE)
                        .ephemeral(true),
                )
                .await;
        }
    }

    /// Simple text response to a slash command.
    async fn respond_message(
        &self,
        ctx: &Context,
        command: &CommandInteraction,
        content: &str,
        ephemeral: bool,
    ) {
        let _ = command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content(content)
                        .ephemeral(ephemeral),
                ),
            )
            .await;
    }

    /// Run a skill by name in a fresh thread under the watched channel.
    async fn handle_skill_command(&self, ctx: &Context, command: &CommandInteraction) {
        let Some(runtime) = self.runtime.get() else {
            return;
        };
        if !self.user_allowed(command.user.id.get() as i64) {
            self.respond_message(ctx, command, "You are not authorized to use this command.", true)
                .await;
            return;
        }

        let name = option_str(command, "name").unwrap_or_default().to_string();
        if !is_valid_skill_name(&name) {
            self.respond_message(ctx, command, &format!("Invalid skill name: `{name}`"), true)
                .await;
            return;
        }
        if !runtime.skills.iter().any(|skill| skill.name == name) {
            self.respond_message(
                ctx,
                command,
                &format!("Skill `{name}` not found — use the autocomplete suggestions."),
                true,
            )
            .await;
            return;
        }

        // Defer: creating the thread and starting the run takes a moment.
        let _ = command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
            )
            .await;

        let thread_id = match runtime
            .gateway
            .create_thread(self.settings.discord.channel_id, &format!("/{name}"), None)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to create skill thread for /{name}: {e}");
                let _ = command
                    .create_followup(
                        &ctx.http,
                        CreateInteractionResponseFollowup::new()
                            .content("Could not create a thread in the Claude channel.")
                            .ephemeral(true),
                    )
                    .await;
                return;
            },
        };

        let _ = command
            .create_followup(
                &ctx.http,
                CreateInteractionResponseFollowup::new()
                    .content(format!("🚀 Running skill `/{name}` → <#{thread_id}>")),
            )
            .await;

        // The prompt is the skill invocation as the CLI understands it.
        runtime
            .supervisor
            .spawn_in_thread(thread_id, format!("/{name}"))
            .await;
    }

    /// Show the available skills, ephemerally.
    async fn handle_skills_list(&self, ctx: &Context, command: &CommandInteraction) {
        let Some(runtime) = self.runtime.get() else {
            return;
        };
        if !self.user_allowed(command.user.id.get() as i64) {
            self.respond_message(ctx, command, "You are not authorized to use this command.", true)
                .await;
            return;
        }

        let overview = skills_overview(&runtime.skills);
        let mut responded = false;
        for chunk in chunk_message(&overview) {
            if responded {
                let _ = command
                    .create_followup(
                        &ctx.http,
                        CreateInteractionResponseFollowup::new()
                            .content(chunk)
                            .ephemeral(true),
                    )
                    .await;
            } else {
                self.respond_message(ctx, command, &chunk, true).await;
                responded = true;
            }
        }
    }

    /// Relay a message from this thread into another thread's session.
    async fn handle_relay_command(&self, ctx: &Context, command: &CommandInteraction) {
        let Some(runtime) = self.runtime.get() else {
            return;
        };
        if !self.user_allowed(command.user.id.get() as i64) {
            self.respond_message(ctx, command, "You are not authorized to use this command.", true)
                .await;
            return;
        }

        let source_id = command.channel_id.get() as i64;
        let source = match command.channel_id.to_channel(ctx).await {
            Ok(Channel::Guild(channel)) if channel.thread_metadata.is_some() => channel,
            _ => {
                self.respond_message(
                    ctx,
                    command,
                    "This command must be used from inside a Claude thread.",
                    true,
                )
                .await;
                return;
            },
        };

        let target = option_channel(command, "target");
        let message = option_str(command, "message").map(String::from);
        let (Some(target), Some(message)) = (target, message) else {
            self.respond_message(ctx, command, "A target thread and a message are required.", true)
                .await;
            return;
        };

        if target == source_id {
            self.respond_message(ctx, command, "Cannot relay a message to the same thread.", true)
                .await;
            return;
        }

        let target_is_claude_thread = match ChannelId::new(target as u64).to_channel(ctx).await {
            Ok(Channel::Guild(channel)) => {
                channel.thread_metadata.is_some()
                    && channel.parent_id.map(|id| id.get() as i64)
                        == Some(self.settings.discord.channel_id)
            },
            _ => false,
        };
        if !target_is_claude_thread {
            self.respond_message(
                ctx,
                command,
                "The target must be a thread in the Claude channel.",
                true,
            )
            .await;
            return;
        }

        // Acknowledge immediately; interrupting the target may take a moment.
        let _ = command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
            )
            .await;

        let relayed = runtime
            .supervisor
            .relay_message(target, source_id, &source.name, &message)
            .await;

        if relayed {
            let _ = command
                .create_followup(
                    &ctx.http,
                    CreateInteractionResponseFollowup::new()
                        .embed(to_create_embed(&relay_sent_embed(target, &message))),
                )
                .await;
        } else {
            let _ = command
                .create_followup(
                    &ctx.http,
                    CreateInteractionResponseFollowup::new()
                        .content("Relay failed — the target thread is unreachable.")
                        .ephemeral(true),
                )
                .await;
        }
    }

    /// Feed the `/skill` autocomplete from the discovered skill list.
    async fn handle_autocomplete(&self, ctx: &Context, interaction: &CommandInteraction) {
        if interaction.data.name != "skill" {
            return;
        }
        let Some(runtime) = self.runtime.get() else {
            return;
        };

        let partial = interaction
            .data
            .autocomplete()
            .map(|option| option.value)
            .unwrap_or_default();

        let mut response = CreateAutocompleteResponse::new();
        for skill in matching_skills(&runtime.skills, partial).into_iter().take(25) {
            response = response.add_string_choice(autocomplete_label(skill), skill.name.clone());
        }
        let _ = interaction
            .create_response(&ctx.http, CreateInteractionResponse::Autocomplete(response))
            .await;
    }

    async fn handle_command(&self, ctx: &Context, command: &CommandInteraction) {
        let Some(runtime) = self.runtime.get() else {
            return;
        };
        let thread_id = command.channel_id.get() as i64;

        match command.data.name.as_str() {
            "stop" => {
                if runtime.supervisor.interrupt_thread(thread_id).await {
                    let _ = command
                        .create_response(
                            &ctx.http,
                            CreateInteractionResponse::Message(
                                CreateInteractionResponseMessage::new()
                                    .embed(to_create_embed(&stopped_embed())),
                            ),
                        )
                        .await;
                } else {
                    let _ = command
                        .create_response(
                            &ctx.http,
                            CreateInteractionResponse::Message(
                                CreateInteractionResponseMessage::new()
                                    .content("No active session is running in this thread.")
                                    .ephemeral(true),
                            ),
                        )
                        .await;
                }
            },
            "clear" => {
                if runtime.supervisor.clear_thread(thread_id).await {
                    let _ = command
                        .create_response(
                            &ctx.http,
                            CreateInteractionResponse::Message(
                                CreateInteractionResponseMessage::new().content(
                                    "🔄 Session cleared. Next message will start a fresh session.",
                                ),
                            ),
                        )
                        .await;
                } else {
                    let _ = command
                        .create_response(
                            &ctx.http,
                            CreateInteractionResponse::Message(
                                CreateInteractionResponseMessage::new()
                                    .content("No active session found for this thread.")
                                    .ephemeral(true),
                            ),
                        )
                        .await;
                }
            },
            "skill" => self.handle_skill_command(ctx, command).await,
            "skills" => self.handle_skills_list(ctx, command).await,
            "relay" => self.handle_relay_command(ctx, command).await,
            _ => {},
        }
    }
}

/// String value of a named command option.
fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|option| option.name == name)
        .and_then(|option| match &option.value {
            CommandDataOptionValue::String(value) => Some(value.as_str()),
            _ => None,
        })
}

/// Channel value of a named command option.
fn option_channel(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|option| option.name == name)
        .and_then(|option| match &option.value {
            CommandDataOptionValue::Channel(id) => Some(id.get() as i64),
            _ => None,
        })
}

#[async_trait]
impl EventHandler for Bridge {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Logged in as {} (ID: {})", ready.user.name, ready.user.id);
        info!("Watching channel ID: {}", self.settings.discord.channel_id);

        let runtime = self.initialize(&ctx).await;
        // Safe on every reconnect: rows are deleted before their runs
        // spawn, so a second pass finds nothing.
        runtime.supervisor.resume_pending().await;
    }

    async fn message(&self, ctx: Context, message: Message) {
        if message.author.bot {
            return;
        }
        if !self.user_allowed(message.author.id.get() as i64) {
            return;
        }
        let Some(runtime) = self.runtime.get() else {
            return;
        };

        let watched = self.settings.discord.channel_id;
        let channel_id = message.channel_id.get() as i64;

        if channel_id == watched {
            let prompt = self.build_prompt(&message).await;
            if prompt.trim().is_empty() {
                return;
            }
            let thread_name: String = message.content.chars().take(100).collect();
            runtime
                .supervisor
                .on_channel_message(message.id.get() as i64, prompt, &thread_name)
                .await;
            return;
        }

        // A reply inside one of the watched channel's threads?
        let is_watched_thread = match message.channel(&ctx).await {
            Ok(Channel::Guild(channel)) => {
                channel.thread_metadata.is_some()
                    && channel.parent_id.map(|id| id.get() as i64) == Some(watched)
            },
            _ => false,
        };
        if !is_watched_thread {
            return;
        }

        let prompt = self.build_prompt(&message).await;
        if prompt.trim().is_empty() {
            return;
        }
        runtime
            .supervisor
            .on_thread_message(channel_id, message.id.get() as i64, prompt)
            .await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match &interaction {
            Interaction::Component(component) => {
                if let Some(thread_id) = StopControl::parse_custom_id(&component.data.custom_id) {
                    self.handle_stop_click(&ctx, component, thread_id).await;
                } else {
                    self.handle_ask_component(&ctx, component).await;
                }
            },
            Interaction::Modal(modal) => self.handle_modal(&ctx, modal).await,
            Interaction::Command(command) => self.handle_command(&ctx, command).await,
            Interaction::Autocomplete(interaction) => {
                self.handle_autocomplete(&ctx, interaction).await;
            },
            _ => {},
        }
    }
}
