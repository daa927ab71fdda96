//! Host application
//!
//! `HostApp` owns the server supervisor, the event stream, the host state and
//! the attached surfaces. A single task feeds it inbound frames and server
//! events in arrival order (see [`run`]); nothing else mutates its state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ocgui_opencode::{
    ClientError, EventSink, EventStreamClient, ExitHook, OpencodeClient, ServerExit,
    ServerManager, ServerOptions,
};
use ocgui_protocol::editor::{PickItem, SurfaceContent, SurfaceEvent};
use ocgui_protocol::{
    build_session_url, parse_session_url, restore_frame_url, EditorCommand, GlobalEventEnvelope,
    HostMessage, InboundFrame, ServerAuth, SessionInfo, Surface,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::context_actions::ContextActions;
use crate::menus::SessionMenuAction;
use crate::reconcile::decide_server_event;
use crate::router::{dispatch_webview_message, WebviewHandlers};
use crate::session_actions::{SessionActions, SessionHost};
use crate::state::HostState;
use crate::workbench::Workbench;

const TITLE: &str = "OpenCode GUI";

/// Everything the host task reacts to.
#[derive(Debug)]
pub enum HostInput {
    Frame(InboundFrame),
    Server(GlobalEventEnvelope),
    /// The supervised server process ended on its own
    ServerExited(ServerExit),
    /// The editor went away
    Closed,
}

/// Event sink that forwards server events into the host queue.
pub fn event_sink(tx: mpsc::UnboundedSender<HostInput>) -> EventSink {
    Arc::new(move |event| {
        let _ = tx.send(HostInput::Server(event));
    })
}

fn exit_hook(tx: mpsc::UnboundedSender<HostInput>) -> ExitHook {
    Arc::new(move |exit| {
        let _ = tx.send(HostInput::ServerExited(exit));
    })
}

pub struct HostApp {
    state: HostState,
    server: ServerManager,
    events: EventStreamClient,
    http: reqwest::Client,
    auth: Option<ServerAuth>,
    wb: Arc<dyn Workbench>,
    /// Attached surfaces, in attach order
    surfaces: Vec<Surface>,
    /// Last URL each surface's frame reported as loaded
    frame_urls: HashMap<Surface, String>,
}

impl HostApp {
    pub fn new(
        server: ServerOptions,
        auth: Option<ServerAuth>,
        state: HostState,
        wb: Arc<dyn Workbench>,
        inputs: mpsc::UnboundedSender<HostInput>,
    ) -> Self {
        let http = reqwest::Client::new();
        let server = server.on_exit(exit_hook(inputs.clone()));
        Self {
            state,
            server: ServerManager::new(server),
            events: EventStreamClient::with_http(http.clone(), event_sink(inputs)),
            http,
            auth,
            wb,
            surfaces: Vec::new(),
            frame_urls: HashMap::new(),
        }
    }

    pub fn state(&self) -> &HostState {
        &self.state
    }

    /// Publish the initial status bar item.
    pub async fn start(&mut self) {
        self.update_status().await;
    }

    pub async fn handle_input(&mut self, input: HostInput) {
        match input {
            HostInput::Frame(frame) => self.handle_frame(frame).await,
            HostInput::Server(event) => self.handle_server_event(&event).await,
            HostInput::ServerExited(exit) => self.handle_server_exit(exit).await,
            HostInput::Closed => {}
        }
    }

    pub async fn handle_frame(&mut self, frame: InboundFrame) {
        match frame {
            InboundFrame::Webview { surface, message } => {
                dispatch_webview_message(surface, &message, self).await;
            }
            InboundFrame::Command { command } => self.handle_command(command).await,
            InboundFrame::Surface { surface, event } => match event {
                SurfaceEvent::Opened => self.attach_surface(surface).await,
                SurfaceEvent::Closed => self.detach_surface(surface),
            },
            InboundFrame::Reply { id, .. } => {
                // Replies are routed by the bridge reader; one arriving here is stale.
                debug!(
                    component = "host",
                    event = "host.reply.unmatched",
                    request_id = %id,
                    "Dropping reply with no pending request"
                );
            }
        }
    }

    pub async fn handle_command(&mut self, command: EditorCommand) {
        info!(
            component = "host",
            event = "host.command",
            command = ?command,
            "Editor command"
        );
        match command {
            EditorCommand::Open => self.open().await,
            EditorCommand::OpenPanel => self.wb.open_panel().await,
            EditorCommand::Refresh => self.refresh().await,
            EditorCommand::NewSession => SessionActions::new(self).new_session().await,
            EditorCommand::SwitchSession => SessionActions::new(self).switch_session().await,
            EditorCommand::SessionActions => self.session_actions_menu().await,
            EditorCommand::RenameSession => SessionActions::new(self).rename_session().await,
            EditorCommand::DeleteSession => SessionActions::new(self).delete_session().await,
            EditorCommand::ForkSession => SessionActions::new(self).fork_session().await,
            EditorCommand::ShareSession => SessionActions::new(self).share_session().await,
            EditorCommand::UnshareSession => SessionActions::new(self).unshare_session().await,
            EditorCommand::CompactSession => SessionActions::new(self).compact_session().await,
            EditorCommand::AttachFile => ContextActions::new(self).attach_file_context().await,
            EditorCommand::AttachExplorerFiles { paths } => {
                ContextActions::new(self).attach_explorer_files(&paths).await
            }
            EditorCommand::AttachSymbol => ContextActions::new(self).attach_symbol_context().await,
            EditorCommand::AttachGitDiff => {
                ContextActions::new(self).attach_git_diff_context().await
            }
            EditorCommand::CopyFileReference => {
                ContextActions::new(self).copy_active_file_reference().await
            }
            EditorCommand::SendContext => ContextActions::new(self).send_active_context().await,
            EditorCommand::AbortSession => {
                SessionActions::new(self).abort_active_session().await
            }
            EditorCommand::OpenReference => {
                ContextActions::new(self).open_reference_in_editor().await
            }
            EditorCommand::ReviewPermissions => {
                SessionActions::new(self).review_permissions().await
            }
            EditorCommand::ShowTodo => SessionActions::new(self).show_session_todo().await,
            EditorCommand::ShowDiff => SessionActions::new(self).show_session_diff().await,
            EditorCommand::RunCommand => SessionActions::new(self).run_session_command().await,
            EditorCommand::RunShell => SessionActions::new(self).run_session_shell().await,
        }
    }

    /// Apply one pushed server event.
    pub async fn handle_server_event(&mut self, event: &GlobalEventEnvelope) {
        let decision = decide_server_event(event, self.state.active_session());
        if decision.is_noop() {
            return;
        }
        debug!(
            component = "host",
            event = "host.server_event",
            event_type = ?event.event_type(),
            decision = ?decision,
            "Applying server event"
        );

        if let Some(session) = decision.next_session {
            let changed = self.state.active_session() != Some(&session);
            self.state.set_active_session(Some(session.clone()));
            if changed {
                self.show_session(&session).await;
            }
        }
        if let Some(next) = decision.next_state {
            self.state.set_runtime_state(next);
        }
        if decision.refresh_permissions {
            self.refresh_permission_count().await;
        }
        self.update_status().await;
    }

    /// Forget a server that died after it became ready.
    pub async fn handle_server_exit(&mut self, exit: ServerExit) {
        let Some(known) = self.state.server_url() else {
            return;
        };
        // A replacement may already be running by the time this is handled.
        if self.server.url().as_deref() == Some(known) {
            return;
        }
        warn!(
            component = "host",
            event = "host.server.exited",
            code = ?exit.code,
            signal = ?exit.signal,
            server_url = %known,
            "opencode server exited"
        );
        self.events.stop();
        self.state.set_server_url(None);
        self.update_status().await;
    }

    pub async fn session_actions_menu(&mut self) {
        let items = SessionMenuAction::ALL
            .iter()
            .map(|action| PickItem::new(action.label()))
            .collect();
        let Some(action) = self
            .wb
            .quick_pick("OpenCode Session Actions", items)
            .await
            .and_then(|index| SessionMenuAction::ALL.get(index).copied())
        else {
            return;
        };

        match action {
            SessionMenuAction::New => SessionActions::new(self).new_session().await,
            SessionMenuAction::Switch => SessionActions::new(self).switch_session().await,
            SessionMenuAction::Compact => SessionActions::new(self).compact_session().await,
            SessionMenuAction::ReviewPermissions => {
                SessionActions::new(self).review_permissions().await
            }
            SessionMenuAction::Todo => SessionActions::new(self).show_session_todo().await,
            SessionMenuAction::Diff => SessionActions::new(self).show_session_diff().await,
            SessionMenuAction::Command => SessionActions::new(self).run_session_command().await,
            SessionMenuAction::Shell => SessionActions::new(self).run_session_shell().await,
            SessionMenuAction::AttachFile => {
                ContextActions::new(self).attach_file_context().await
            }
            SessionMenuAction::AttachSymbol => {
                ContextActions::new(self).attach_symbol_context().await
            }
            SessionMenuAction::AttachDiff => {
                ContextActions::new(self).attach_git_diff_context().await
            }
            SessionMenuAction::Rename => SessionActions::new(self).rename_session().await,
            SessionMenuAction::Fork => SessionActions::new(self).fork_session().await,
            SessionMenuAction::Share => SessionActions::new(self).share_session().await,
            SessionMenuAction::Unshare => SessionActions::new(self).unshare_session().await,
            SessionMenuAction::Stop => SessionActions::new(self).abort_active_session().await,
            SessionMenuAction::Delete => SessionActions::new(self).delete_session().await,
        }
    }

    /// Stop the event stream and the server.
    pub fn dispose(&mut self) {
        info!(component = "host", event = "host.dispose", "Disposing host");
        self.events.stop();
        self.server.dispose();
        self.state.set_server_url(None);
    }

    // -- Surfaces ---------------------------------------------------------------

    async fn attach_surface(&mut self, surface: Surface) {
        if !self.surfaces.contains(&surface) {
            self.surfaces.push(surface);
        }
        self.render_surface(surface).await;
    }

    fn detach_surface(&mut self, surface: Surface) {
        self.surfaces.retain(|s| *s != surface);
    }

    async fn render_surface(&mut self, surface: Surface) {
        self.wb
            .render_surface(
                surface,
                SurfaceContent::Message {
                    text: "Starting OpenCode server...".into(),
                },
            )
            .await;

        let server_url = match self.ensure_server().await {
            Ok(url) => url,
            Err(message) => {
                warn!(
                    component = "host",
                    event = "host.server.start_failed",
                    error = %message,
                    "Failed to start opencode server"
                );
                self.wb
                    .set_status(&format!("$(warning) {TITLE} Error"), &message)
                    .await;
                self.wb
                    .render_surface(
                        surface,
                        SurfaceContent::Message {
                            text: format!("Failed to start OpenCode server\n{message}"),
                        },
                    )
                    .await;
                self.wb
                    .error(&format!("{TITLE} failed to start: {message}"))
                    .await;
                return;
            }
        };

        let frame_url = restore_frame_url(&server_url, self.frame_urls.get(&surface).map(String::as_str));
        self.wb
            .render_surface(
                surface,
                SurfaceContent::Frame {
                    server_url: frame_url,
                    title: TITLE.into(),
                },
            )
            .await;
        info!(
            component = "host",
            event = "host.surface.rendered",
            surface = ?surface,
            server_url = %server_url,
            "Surface connected"
        );

        if let Some(active) = self.state.active_session() {
            let url = build_session_url(&server_url, active);
            self.wb
                .post_message(surface, HostMessage::Navigate { url })
                .await;
        }
    }

    /// Start the server if needed; on success record the URL, start the
    /// event stream and refresh the status bar.
    async fn ensure_server(&mut self) -> Result<String, String> {
        let url = self
            .server
            .ensure_running()
            .await
            .map_err(|e| e.to_string())?;
        if self.state.server_url() != Some(url.as_str()) {
            self.state.set_server_url(Some(url.clone()));
        }
        self.events.start(&url, self.auth.as_ref());
        self.update_status().await;
        Ok(url)
    }

    /// Point attached surfaces at `session` without revealing the view.
    async fn show_session(&self, session: &SessionInfo) {
        let Some(server_url) = self.state.server_url() else {
            return;
        };
        let url = build_session_url(server_url, session);
        for surface in &self.surfaces {
            self.wb
                .post_message(*surface, HostMessage::Navigate { url: url.clone() })
                .await;
        }
    }

    async fn refresh_permission_count(&mut self) {
        let Some(url) = self.server.url() else {
            return;
        };
        let api = OpencodeClient::with_http(self.http.clone(), url, self.auth.clone());
        match api.list_permissions().await {
            Ok(pending) => self.state.set_pending_permissions(pending.len()),
            Err(e) => warn!(
                component = "host",
                event = "host.permissions.refresh_failed",
                error = %e,
                "Failed to refresh pending permissions"
            ),
        }
    }

    async fn update_status(&self) {
        let status = self.state.status();
        self.wb.set_status(&status.text, &status.tooltip).await;
    }
}

impl Drop for HostApp {
    fn drop(&mut self) {
        self.events.stop();
        self.server.dispose();
    }
}

#[async_trait]
impl SessionHost for HostApp {
    fn workbench(&self) -> Arc<dyn Workbench> {
        self.wb.clone()
    }

    async fn client(&mut self) -> Result<OpencodeClient, ClientError> {
        let url = self.server.ensure_running().await?;
        if self.state.server_url() != Some(url.as_str()) {
            self.state.set_server_url(Some(url.clone()));
            self.update_status().await;
        }
        self.events.start(&url, self.auth.as_ref());
        Ok(OpencodeClient::with_http(
            self.http.clone(),
            url,
            self.auth.clone(),
        ))
    }

    async fn default_directory(&self) -> Option<String> {
        self.wb.default_directory().await
    }

    fn active_session(&self) -> Option<SessionInfo> {
        self.state.active_session().cloned()
    }

    fn set_active_session(&mut self, session: Option<SessionInfo>) {
        self.state.set_active_session(session);
    }

    async fn open(&mut self) {
        self.wb.reveal_view().await;
    }

    async fn navigate_surfaces(&mut self, url: &str) {
        if self.surfaces.is_empty() {
            self.open().await;
            return;
        }
        for surface in self.surfaces.clone() {
            self.wb
                .post_message(surface, HostMessage::Navigate { url: url.to_string() })
                .await;
        }
    }

    async fn post_primary(&mut self, message: HostMessage) {
        let primary = if self.surfaces.contains(&Surface::Sidebar) {
            Surface::Sidebar
        } else if self.surfaces.contains(&Surface::Panel) {
            Surface::Panel
        } else {
            return;
        };
        self.wb.post_message(primary, message).await;
    }

    async fn refresh(&mut self) {
        for surface in self.surfaces.clone() {
            self.render_surface(surface).await;
        }
    }
}

#[async_trait]
impl WebviewHandlers for HostApp {
    async fn on_ready(&mut self, surface: Surface, url: String) {
        debug!(
            component = "host",
            event = "host.frame.ready",
            surface = ?surface,
            url = %url,
            "Frame ready"
        );
        if let Some(session) = parse_session_url(&url) {
            self.frame_urls.insert(surface, url);
            self.state.set_active_session(Some(session));
        }
    }

    async fn on_new_session(&mut self) {
        SessionActions::new(self).new_session().await;
    }

    async fn on_session_menu(&mut self) {
        self.session_actions_menu().await;
    }

    async fn on_review_permissions(&mut self) {
        SessionActions::new(self).review_permissions().await;
    }

    async fn on_attach_menu(&mut self) {
        ContextActions::new(self).attach_actions().await;
    }

    async fn on_send_context(&mut self) {
        ContextActions::new(self).send_active_context().await;
    }

    async fn on_prompt(&mut self, text: String) {
        SessionActions::new(self)
            .send_text_context(&text, "Prompt sent to OpenCode")
            .await;
    }

    async fn on_switch_session(&mut self) {
        SessionActions::new(self).switch_session().await;
    }

    async fn on_open_panel(&mut self) {
        self.wb.open_panel().await;
    }

    async fn on_show_todo(&mut self) {
        SessionActions::new(self).show_session_todo().await;
    }

    async fn on_show_diff(&mut self) {
        SessionActions::new(self).show_session_diff().await;
    }

    async fn on_run_command(&mut self) {
        SessionActions::new(self).run_session_command().await;
    }

    async fn on_run_shell(&mut self) {
        SessionActions::new(self).run_session_shell().await;
    }

    async fn on_abort_session(&mut self) {
        SessionActions::new(self).abort_active_session().await;
    }

    async fn on_open_reference(&mut self) {
        ContextActions::new(self).open_reference_in_editor().await;
    }

    async fn on_refresh(&mut self) {
        self.refresh().await;
    }

    async fn on_frame_error(&mut self) {
        self.wb.error(&format!("{TITLE} frame failed to load")).await;
    }
}

/// Drive `app` until the editor closes the bridge or every sender is gone.
pub async fn run(mut app: HostApp, mut rx: mpsc::UnboundedReceiver<HostInput>) {
    app.start().await;
    while let Some(input) = rx.recv().await {
        if matches!(input, HostInput::Closed) {
            info!(
                component = "host",
                event = "host.bridge.closed",
                "Editor bridge closed"
            );
            break;
        }
        app.handle_input(input).await;
    }
    app.dispose();
}
