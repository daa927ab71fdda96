//! Session lifecycle actions
//!
//! Each action resolves a target session, makes sure the server is running,
//! calls the API, updates the active session and surfaces, and reports the
//! outcome through the workbench. Failures read `Failed to <action>: <msg>`.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use ocgui_opencode::api::{CommandRequest, SummarizeRequest};
use ocgui_opencode::{pick_active_session, ClientError, OpencodeClient};
use ocgui_protocol::editor::{InputOptions, PickItem};
use ocgui_protocol::{build_session_url, HostMessage, PermissionReply, SessionInfo};
use tracing::{info, warn};

use crate::command_input::parse_session_command_input;
use crate::session_picker::build_session_pick_items;
use crate::workbench::Workbench;

const PICKER_LIMIT: u32 = 100;
const PROMPT_LOOKUP_LIMIT: u32 = 20;
const DEFAULT_SHELL_AGENT: &str = "build";

/// Host capabilities the actions run against.
#[async_trait]
pub trait SessionHost: Send {
    fn workbench(&self) -> Arc<dyn Workbench>;

    /// Ensure the server is running and return a client bound to it.
    async fn client(&mut self) -> Result<OpencodeClient, ClientError>;

    async fn default_directory(&self) -> Option<String>;
    fn active_session(&self) -> Option<SessionInfo>;
    fn set_active_session(&mut self, session: Option<SessionInfo>);

    /// Reveal the sidebar view.
    async fn open(&mut self);

    /// Point every attached surface at `url`; opens the view when none is attached.
    async fn navigate_surfaces(&mut self, url: &str);

    /// Post to the sidebar surface, else the panel.
    async fn post_primary(&mut self, message: HostMessage);

    /// Re-render every attached surface.
    async fn refresh(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CompactionModel {
    provider_id: String,
    model_id: String,
}

pub struct SessionActions<'a, H: SessionHost + ?Sized> {
    host: &'a mut H,
    wb: Arc<dyn Workbench>,
}

impl<'a, H: SessionHost + ?Sized> SessionActions<'a, H> {
    pub fn new(host: &'a mut H) -> Self {
        let wb = host.workbench();
        Self { host, wb }
    }

    // -- Create / switch --------------------------------------------------------

    pub async fn new_session(&mut self) {
        if let Err(e) = self.try_new_session().await {
            self.fail("create OpenCode session", &e).await;
        }
    }

    async fn try_new_session(&mut self) -> Result<(), ClientError> {
        let api = self.host.client().await?;
        let directory = self.host.default_directory().await;
        let session = api.create_session(directory.as_deref()).await?;
        let next = session.info();
        info!(
            component = "session_actions",
            event = "session.created",
            session_id = %next.id,
            directory = %next.directory,
            "Created OpenCode session"
        );
        self.host.set_active_session(Some(next.clone()));
        self.host.open().await;
        self.host
            .navigate_surfaces(&build_session_url(api.base_url(), &next))
            .await;
        Ok(())
    }

    pub async fn switch_session(&mut self) {
        if let Err(e) = self.try_switch_session().await {
            self.fail("switch session", &e).await;
        }
    }

    async fn try_switch_session(&mut self) -> Result<(), ClientError> {
        let api = self.host.client().await?;
        let Some(session) = self.pick_session(&api, "Switch OpenCode Session").await? else {
            self.wb.info("No sessions found").await;
            return Ok(());
        };
        self.host.set_active_session(Some(session.clone()));
        self.host
            .navigate_surfaces(&build_session_url(api.base_url(), &session))
            .await;
        Ok(())
    }

    // -- Session-scoped operations ----------------------------------------------

    pub async fn abort_active_session(&mut self) {
        if let Err(e) = self.try_abort().await {
            self.fail("stop session", &e).await;
        }
    }

    async fn try_abort(&mut self) -> Result<(), ClientError> {
        let Some(session) = self.resolve_session("Select Session To Stop").await? else {
            return Ok(());
        };
        let api = self.host.client().await?;
        api.abort_session(Some(&session.directory), &session.id)
            .await?;
        self.wb.info("Requested session stop").await;
        Ok(())
    }

    pub async fn rename_session(&mut self) {
        if let Err(e) = self.try_rename().await {
            self.fail("rename session", &e).await;
        }
    }

    async fn try_rename(&mut self) -> Result<(), ClientError> {
        let Some(session) = self.resolve_session("Select Session To Rename").await? else {
            return Ok(());
        };
        let title = self
            .wb
            .input_box(InputOptions {
                title: "Rename OpenCode Session".into(),
                prompt: "Enter new session title".into(),
                value: Some(session.id.clone()),
                required: true,
                ..Default::default()
            })
            .await;
        let Some(title) = non_blank(title) else {
            return Ok(());
        };

        let api = self.host.client().await?;
        let updated = api
            .rename_session(Some(&session.directory), &session.id, &title)
            .await?;
        let next = updated.info();
        self.host.set_active_session(Some(next.clone()));
        self.host
            .navigate_surfaces(&build_session_url(api.base_url(), &next))
            .await;
        self.wb.info("Session renamed").await;
        Ok(())
    }

    pub async fn delete_session(&mut self) {
        if let Err(e) = self.try_delete().await {
            self.fail("delete session", &e).await;
        }
    }

    async fn try_delete(&mut self) -> Result<(), ClientError> {
        let Some(session) = self.resolve_session("Select Session To Delete").await? else {
            return Ok(());
        };
        let confirmed = self
            .wb
            .confirm(
                &format!("Delete session {}? This cannot be undone.", session.id),
                "Delete",
            )
            .await;
        if !confirmed {
            return Ok(());
        }

        let api = self.host.client().await?;
        api.delete_session(Some(&session.directory), &session.id)
            .await?;
        if self
            .host
            .active_session()
            .is_some_and(|active| active.id == session.id)
        {
            self.host.set_active_session(None);
        }
        self.host.refresh().await;
        self.wb.info("Session deleted").await;
        Ok(())
    }

    pub async fn fork_session(&mut self) {
        if let Err(e) = self.try_fork().await {
            self.fail("fork session", &e).await;
        }
    }

    async fn try_fork(&mut self) -> Result<(), ClientError> {
        let Some(session) = self.resolve_session("Select Session To Fork").await? else {
            return Ok(());
        };
        let api = self.host.client().await?;
        let forked = api
            .fork_session(Some(&session.directory), &session.id)
            .await?;
        let next = forked.info();
        self.host.set_active_session(Some(next.clone()));
        self.host
            .navigate_surfaces(&build_session_url(api.base_url(), &next))
            .await;
        self.wb.info("Session forked").await;
        Ok(())
    }

    pub async fn share_session(&mut self) {
        if let Err(e) = self.try_share().await {
            self.fail("share session", &e).await;
        }
    }

    async fn try_share(&mut self) -> Result<(), ClientError> {
        let Some(session) = self.resolve_session("Select Session To Share").await? else {
            return Ok(());
        };
        let api = self.host.client().await?;
        let shared = api
            .share_session(Some(&session.directory), &session.id)
            .await?;
        let Some(url) = shared.share_url().filter(|url| !url.is_empty()) else {
            self.wb.error("Session shared but no URL was returned").await;
            return Ok(());
        };
        self.wb.write_clipboard(url).await;
        self.wb.info(&format!("Share link copied: {url}")).await;
        Ok(())
    }

    pub async fn unshare_session(&mut self) {
        if let Err(e) = self.try_unshare().await {
            self.fail("unshare session", &e).await;
        }
    }

    async fn try_unshare(&mut self) -> Result<(), ClientError> {
        let Some(session) = self.resolve_session("Select Session To Unshare").await? else {
            return Ok(());
        };
        let api = self.host.client().await?;
        api.unshare_session(Some(&session.directory), &session.id)
            .await?;
        self.wb.info("Session unshared").await;
        Ok(())
    }

    pub async fn compact_session(&mut self) {
        if let Err(e) = self.try_compact().await {
            self.fail("compact session", &e).await;
        }
    }

    async fn try_compact(&mut self) -> Result<(), ClientError> {
        let Some(session) = self.resolve_session("Select Session To Compact").await? else {
            return Ok(());
        };
        let api = self.host.client().await?;
        let Some(model) = self
            .pick_compaction_model(&api, Some(&session.directory))
            .await?
        else {
            return Ok(());
        };

        api.summarize_session(
            Some(&session.directory),
            &session.id,
            &SummarizeRequest {
                provider_id: model.provider_id.clone(),
                model_id: model.model_id.clone(),
                auto: false,
            },
        )
        .await?;
        self.wb
            .info(&format!(
                "Session compact requested: {}/{}",
                model.provider_id, model.model_id
            ))
            .await;
        Ok(())
    }

    pub async fn review_permissions(&mut self) {
        if let Err(e) = self.try_review_permissions().await {
            self.fail("review permissions", &e).await;
        }
    }

    async fn try_review_permissions(&mut self) -> Result<(), ClientError> {
        let api = self.host.client().await?;
        let pending = api.list_permissions().await?;
        if pending.is_empty() {
            self.wb.info("No pending permissions").await;
            return Ok(());
        }

        let items = pending
            .iter()
            .map(|request| {
                let mut patterns = request.patterns.join(", ");
                if patterns.is_empty() {
                    patterns = "No patterns".to_string();
                }
                PickItem::new(request.permission.clone())
                    .description(request.session_id.clone())
                    .detail(patterns)
            })
            .collect();
        let Some(picked) = self
            .wb
            .quick_pick("Pending Permissions", items)
            .await
            .and_then(|index| pending.get(index))
        else {
            return Ok(());
        };

        let verbs = PermissionReply::ALL
            .iter()
            .map(|reply| PickItem::new(reply.label()))
            .collect();
        let Some(reply) = self
            .wb
            .quick_pick(&format!("Permission: {}", picked.permission), verbs)
            .await
            .and_then(|index| PermissionReply::ALL.get(index).copied())
        else {
            return Ok(());
        };

        let message = if reply == PermissionReply::Reject {
            let reason = self
                .wb
                .input_box(InputOptions {
                    title: "Reject Permission".into(),
                    prompt: "Optional reason".into(),
                    placeholder: Some("Reason (optional)".into()),
                    ..Default::default()
                })
                .await;
            non_blank(reason)
        } else {
            None
        };

        api.reply_permission(&picked.id, reply, message.as_deref())
            .await?;
        self.wb
            .info(&format!("Permission replied: {}", reply.as_str()))
            .await;
        Ok(())
    }

    pub async fn show_session_todo(&mut self) {
        if let Err(e) = self.try_show_todo().await {
            self.fail("load session todo", &e).await;
        }
    }

    async fn try_show_todo(&mut self) -> Result<(), ClientError> {
        let Some(session) = self.resolve_session("Select Session To View Todo").await? else {
            return Ok(());
        };
        let api = self.host.client().await?;
        let todos = api
            .list_session_todos(Some(&session.directory), &session.id)
            .await?;
        if todos.is_empty() {
            self.wb.info("No todos in this session").await;
            return Ok(());
        }

        let items = todos
            .iter()
            .map(|todo| {
                PickItem::new(format!("[{}] {}", todo.status, todo.content))
                    .description(todo.priority.clone())
                    .detail(todo.id.clone())
            })
            .collect();
        self.wb
            .quick_pick(&format!("Session Todo ({})", todos.len()), items)
            .await;
        Ok(())
    }

    pub async fn show_session_diff(&mut self) {
        if let Err(e) = self.try_show_diff().await {
            self.fail("load session diff", &e).await;
        }
    }

    async fn try_show_diff(&mut self) -> Result<(), ClientError> {
        let Some(session) = self.resolve_session("Select Session To View Diff").await? else {
            return Ok(());
        };
        let Some(filter) = self
            .wb
            .input_box(InputOptions {
                title: "Session Diff".into(),
                prompt: "Optional message ID filter".into(),
                placeholder: Some("message_xxx (leave empty for latest)".into()),
                ..Default::default()
            })
            .await
        else {
            return Ok(());
        };
        let message_id = filter.trim();
        if !message_id.is_empty() && message_id.chars().count() <= 2 {
            self.wb.error("Message ID seems too short").await;
            return Ok(());
        }

        let api = self.host.client().await?;
        let diff = api
            .get_session_diff(
                Some(&session.directory),
                &session.id,
                Some(message_id).filter(|m| !m.is_empty()),
            )
            .await?;
        if diff.is_empty() {
            self.wb.info("No diff found for this session").await;
            return Ok(());
        }

        let content = serde_json::to_string_pretty(&diff)
            .map_err(|_| ClientError::Validation("Invalid diff response"))?;
        self.wb.open_document(&content, "json").await;
        Ok(())
    }

    pub async fn run_session_command(&mut self) {
        if let Err(e) = self.try_run_command().await {
            self.fail("run session command", &e).await;
        }
    }

    async fn try_run_command(&mut self) -> Result<(), ClientError> {
        let Some(session) = self.resolve_session("Select Session To Run Command").await? else {
            return Ok(());
        };
        let raw = self
            .wb
            .input_box(InputOptions {
                title: "Run Session Command".into(),
                prompt: "Input command with args. Example: /summarize this file".into(),
                placeholder: Some("/command arguments...".into()),
                required: true,
                ..Default::default()
            })
            .await;
        let Some(parsed) = raw.as_deref().and_then(parse_session_command_input) else {
            return Ok(());
        };

        let api = self.host.client().await?;
        api.run_session_command(
            Some(&session.directory),
            &session.id,
            &CommandRequest {
                command: parsed.command.clone(),
                arguments: parsed.arguments,
                ..Default::default()
            },
        )
        .await?;
        self.wb
            .info(&format!("Session command executed: /{}", parsed.command))
            .await;
        Ok(())
    }

    pub async fn run_session_shell(&mut self) {
        if let Err(e) = self.try_run_shell().await {
            self.fail("run session shell", &e).await;
        }
    }

    async fn try_run_shell(&mut self) -> Result<(), ClientError> {
        let Some(session) = self.resolve_session("Select Session To Run Shell").await? else {
            return Ok(());
        };
        let command = self
            .wb
            .input_box(InputOptions {
                title: "Run Session Shell".into(),
                prompt: "Shell command to execute in session context".into(),
                placeholder: Some("git status".into()),
                required: true,
                ..Default::default()
            })
            .await;
        let Some(command) = non_blank(command) else {
            return Ok(());
        };
        let agent = self
            .wb
            .input_box(InputOptions {
                title: "Session Shell Agent".into(),
                prompt: "Agent name".into(),
                value: Some(DEFAULT_SHELL_AGENT.into()),
                required: true,
                ..Default::default()
            })
            .await;
        let Some(agent) = non_blank(agent) else {
            return Ok(());
        };

        let api = self.host.client().await?;
        api.run_session_shell(Some(&session.directory), &session.id, &command, &agent)
            .await?;
        self.wb.info("Session shell command executed").await;
        Ok(())
    }

    // -- Prompt -----------------------------------------------------------------

    /// Send `text` to the active session, adopting or creating one as needed.
    pub async fn send_text_context(&mut self, text: &str, success_message: &str) {
        self.host.open().await;
        if let Err(e) = self.try_send_text(text, success_message).await {
            self.fail("send context", &e).await;
        }
    }

    async fn try_send_text(&mut self, text: &str, success_message: &str) -> Result<(), ClientError> {
        let api = self.host.client().await?;
        let directory = self.host.default_directory().await;

        let mut session = match self.host.active_session() {
            Some(active) => active,
            None => {
                let sessions = api
                    .list_sessions(directory.as_deref(), Some(PROMPT_LOOKUP_LIMIT))
                    .await?;
                match pick_active_session(&sessions) {
                    Some(latest) => latest.info(),
                    None => api.create_session(directory.as_deref()).await?.info(),
                }
            }
        };

        match api
            .prompt_session_with_text(Some(&session.directory), &session.id, text)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(
                    component = "session_actions",
                    event = "session.prompt.recreate",
                    session_id = %session.id,
                    "Prompt target session is gone, creating a replacement"
                );
                session = api.create_session(directory.as_deref()).await?.info();
                api.prompt_session_with_text(Some(&session.directory), &session.id, text)
                    .await?;
            }
            Err(e) => return Err(e),
        }

        self.host.set_active_session(Some(session.clone()));
        self.host
            .navigate_surfaces(&build_session_url(api.base_url(), &session))
            .await;
        self.wb.info(success_message).await;
        Ok(())
    }

    // -- Helpers ----------------------------------------------------------------

    /// The active session, else one picked by the user (which becomes active).
    async fn resolve_session(&mut self, title: &str) -> Result<Option<SessionInfo>, ClientError> {
        if let Some(active) = self.host.active_session() {
            return Ok(Some(active));
        }
        let api = self.host.client().await?;
        let Some(picked) = self.pick_session(&api, title).await? else {
            self.wb.info("No OpenCode session selected").await;
            return Ok(None);
        };
        self.host.set_active_session(Some(picked.clone()));
        Ok(Some(picked))
    }

    async fn pick_session(
        &mut self,
        api: &OpencodeClient,
        title: &str,
    ) -> Result<Option<SessionInfo>, ClientError> {
        let directory = self.host.default_directory().await;
        let sessions = api
            .list_sessions(directory.as_deref(), Some(PICKER_LIMIT))
            .await?;
        let mut items = build_session_pick_items(&sessions, now_ms());
        if items.is_empty() {
            return Ok(None);
        }
        let rows = items.iter().map(|row| row.item.clone()).collect();
        let picked = self.wb.quick_pick(title, rows).await;
        Ok(picked
            .filter(|index| *index < items.len())
            .map(|index| items.swap_remove(index).session))
    }

    async fn pick_compaction_model(
        &mut self,
        api: &OpencodeClient,
        directory: Option<&str>,
    ) -> Result<Option<CompactionModel>, ClientError> {
        let config = api.list_config_providers(directory).await?;

        let mut candidates: Vec<(PickItem, CompactionModel)> = Vec::new();
        for provider in &config.providers {
            let model_id = config
                .default_model(&provider.id)
                .filter(|m| !m.is_empty())
                .or_else(|| provider.models.first().map(|m| m.id.as_str()));
            let Some(model_id) = model_id else {
                continue;
            };
            let model_name = provider
                .model(model_id)
                .and_then(|m| m.name.as_deref())
                .unwrap_or(model_id);
            candidates.push((
                PickItem::new(provider.name.clone())
                    .description(provider.id.clone())
                    .detail(format!("{model_name} ({model_id})")),
                CompactionModel {
                    provider_id: provider.id.clone(),
                    model_id: model_id.to_string(),
                },
            ));
        }

        match candidates.len() {
            0 => {
                self.wb
                    .error("No provider/model available for compaction")
                    .await;
                Ok(None)
            }
            1 => Ok(candidates.pop().map(|(_, model)| model)),
            _ => {
                let items = candidates.iter().map(|(item, _)| item.clone()).collect();
                let picked = self
                    .wb
                    .quick_pick("Select Model For Session Compact", items)
                    .await;
                Ok(picked
                    .filter(|index| *index < candidates.len())
                    .map(|index| candidates.swap_remove(index).1))
            }
        }
    }

    async fn fail(&self, action: &str, error: &ClientError) {
        warn!(
            component = "session_actions",
            event = "session.action_failed",
            action = %action,
            error = %error,
            "Session action failed"
        );
        self.wb.error(&format!("Failed to {action}: {error}")).await;
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
