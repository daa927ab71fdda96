//! Scripted fakes shared by the host tests

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use ocgui_opencode::{ClientError, OpencodeClient};
use ocgui_protocol::editor::{
    ActiveFile, InputOptions, MessageLevel, PickItem, SurfaceContent, SymbolHit,
};
use ocgui_protocol::{HostMessage, LineRange, SessionInfo, Surface};
use serde_json::{json, Value};

use crate::session_actions::SessionHost;
use crate::workbench::Workbench;

// ---------------------------------------------------------------------------
// Workbench
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Said {
    Info(String),
    Warning(String),
    Error(String),
}

#[derive(Default)]
struct Script {
    said: Vec<Said>,
    picks: VecDeque<Option<usize>>,
    inputs: VecDeque<Option<String>>,
    confirms: VecDeque<bool>,
    pick_titles: Vec<(String, Vec<PickItem>)>,
    inputs_shown: Vec<InputOptions>,
    clipboard: String,
    active_file: Option<ActiveFile>,
    files: Vec<String>,
    symbols: Vec<SymbolHit>,
    folders: Vec<String>,
    existing: HashSet<String>,
    opened_files: Vec<(String, Option<LineRange>)>,
    documents: Vec<(String, String)>,
    rendered: Vec<(Surface, SurfaceContent)>,
    posted: Vec<(Surface, HostMessage)>,
    statuses: Vec<(String, String)>,
    revealed: usize,
    panels: usize,
}

/// Answers dialogs from queues; an empty queue reads as a dismissal.
#[derive(Default)]
pub struct FakeWorkbench {
    script: Mutex<Script>,
}

impl FakeWorkbench {
    pub fn push_pick(&self, pick: Option<usize>) {
        self.script.lock().unwrap().picks.push_back(pick);
    }

    pub fn push_input(&self, input: Option<String>) {
        self.script.lock().unwrap().inputs.push_back(input);
    }

    pub fn push_confirm(&self, confirmed: bool) {
        self.script.lock().unwrap().confirms.push_back(confirmed);
    }

    pub fn set_clipboard(&self, text: &str) {
        self.script.lock().unwrap().clipboard = text.to_string();
    }

    pub fn set_active_file(&self, file: Option<ActiveFile>) {
        self.script.lock().unwrap().active_file = file;
    }

    pub fn set_files(&self, files: &[&str]) {
        let mut script = self.script.lock().unwrap();
        script.files = files.iter().map(|f| f.to_string()).collect();
        script.existing = script.files.iter().cloned().collect();
    }

    pub fn set_symbols(&self, symbols: Vec<SymbolHit>) {
        self.script.lock().unwrap().symbols = symbols;
    }

    pub fn set_folders(&self, folders: &[&str]) {
        self.script.lock().unwrap().folders = folders.iter().map(|f| f.to_string()).collect();
    }

    pub fn said(&self) -> Vec<Said> {
        self.script.lock().unwrap().said.clone()
    }

    pub fn clipboard(&self) -> String {
        self.script.lock().unwrap().clipboard.clone()
    }

    pub fn pick_titles(&self) -> Vec<String> {
        let script = self.script.lock().unwrap();
        script.pick_titles.iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn pick_items(&self, index: usize) -> Vec<PickItem> {
        self.script.lock().unwrap().pick_titles[index].1.clone()
    }

    pub fn inputs_shown(&self) -> Vec<InputOptions> {
        self.script.lock().unwrap().inputs_shown.clone()
    }

    pub fn opened_files(&self) -> Vec<(String, Option<LineRange>)> {
        self.script.lock().unwrap().opened_files.clone()
    }

    pub fn documents(&self) -> Vec<(String, String)> {
        self.script.lock().unwrap().documents.clone()
    }

    pub fn rendered(&self) -> Vec<(Surface, SurfaceContent)> {
        self.script.lock().unwrap().rendered.clone()
    }

    pub fn posted(&self) -> Vec<(Surface, HostMessage)> {
        self.script.lock().unwrap().posted.clone()
    }

    pub fn statuses(&self) -> Vec<(String, String)> {
        self.script.lock().unwrap().statuses.clone()
    }

    pub fn revealed(&self) -> usize {
        self.script.lock().unwrap().revealed
    }

    pub fn panels(&self) -> usize {
        self.script.lock().unwrap().panels
    }
}

#[async_trait]
impl Workbench for FakeWorkbench {
    async fn show_message(&self, level: MessageLevel, message: &str) {
        let said = match level {
            MessageLevel::Info => Said::Info(message.to_string()),
            MessageLevel::Warning => Said::Warning(message.to_string()),
            MessageLevel::Error => Said::Error(message.to_string()),
        };
        self.script.lock().unwrap().said.push(said);
    }

    async fn confirm(&self, _message: &str, _action: &str) -> bool {
        self.script.lock().unwrap().confirms.pop_front().unwrap_or(false)
    }

    async fn quick_pick(&self, title: &str, items: Vec<PickItem>) -> Option<usize> {
        let mut script = self.script.lock().unwrap();
        script.pick_titles.push((title.to_string(), items));
        script.picks.pop_front().flatten()
    }

    async fn input_box(&self, options: InputOptions) -> Option<String> {
        let mut script = self.script.lock().unwrap();
        script.inputs_shown.push(options);
        script.inputs.pop_front().flatten()
    }

    async fn read_clipboard(&self) -> String {
        self.clipboard()
    }

    async fn write_clipboard(&self, text: &str) {
        self.set_clipboard(text);
    }

    async fn reveal_view(&self) {
        self.script.lock().unwrap().revealed += 1;
    }

    async fn open_panel(&self) {
        self.script.lock().unwrap().panels += 1;
    }

    async fn render_surface(&self, surface: Surface, content: SurfaceContent) {
        self.script.lock().unwrap().rendered.push((surface, content));
    }

    async fn post_message(&self, surface: Surface, message: HostMessage) {
        self.script.lock().unwrap().posted.push((surface, message));
    }

    async fn set_status(&self, text: &str, tooltip: &str) {
        self.script
            .lock()
            .unwrap()
            .statuses
            .push((text.to_string(), tooltip.to_string()));
    }

    async fn open_document(&self, content: &str, language: &str) {
        self.script
            .lock()
            .unwrap()
            .documents
            .push((content.to_string(), language.to_string()));
    }

    async fn open_file(&self, path: &str, range: Option<LineRange>) -> bool {
        let mut script = self.script.lock().unwrap();
        if !script.existing.contains(path) {
            return false;
        }
        script.opened_files.push((path.to_string(), range));
        true
    }

    async fn active_file(&self) -> Option<ActiveFile> {
        self.script.lock().unwrap().active_file.clone()
    }

    async fn workspace_files(&self) -> Vec<String> {
        self.script.lock().unwrap().files.clone()
    }

    async fn workspace_symbols(&self, query: &str) -> Vec<SymbolHit> {
        self.script
            .lock()
            .unwrap()
            .symbols
            .iter()
            .filter(|s| s.name.contains(query))
            .cloned()
            .collect()
    }

    async fn workspace_folders(&self) -> Vec<String> {
        self.script.lock().unwrap().folders.clone()
    }

    async fn default_directory(&self) -> Option<String> {
        self.script.lock().unwrap().folders.first().cloned()
    }
}

// ---------------------------------------------------------------------------
// Session host
// ---------------------------------------------------------------------------

/// Records what the actions asked of the host.
pub struct FakeHost {
    pub wb: Arc<FakeWorkbench>,
    pub url: String,
    pub directory: Option<String>,
    pub active: Option<SessionInfo>,
    pub opened: usize,
    pub refreshed: usize,
    pub navigated: Vec<String>,
    pub posted: Vec<HostMessage>,
}

impl FakeHost {
    pub fn new(url: &str) -> Self {
        Self {
            wb: Arc::new(FakeWorkbench::default()),
            url: url.to_string(),
            directory: Some("/w".to_string()),
            active: None,
            opened: 0,
            refreshed: 0,
            navigated: Vec::new(),
            posted: Vec::new(),
        }
    }
}

#[async_trait]
impl SessionHost for FakeHost {
    fn workbench(&self) -> Arc<dyn Workbench> {
        self.wb.clone()
    }

    async fn client(&mut self) -> Result<OpencodeClient, ClientError> {
        Ok(OpencodeClient::new(self.url.clone(), None))
    }

    async fn default_directory(&self) -> Option<String> {
        self.directory.clone()
    }

    fn active_session(&self) -> Option<SessionInfo> {
        self.active.clone()
    }

    fn set_active_session(&mut self, session: Option<SessionInfo>) {
        self.active = session;
    }

    async fn open(&mut self) {
        self.opened += 1;
    }

    async fn navigate_surfaces(&mut self, url: &str) {
        self.navigated.push(url.to_string());
    }

    async fn post_primary(&mut self, message: HostMessage) {
        self.posted.push(message);
    }

    async fn refresh(&mut self) {
        self.refreshed += 1;
    }
}

// ---------------------------------------------------------------------------
// opencode server
// ---------------------------------------------------------------------------

/// Session id that makes every session-scoped route fail with 500.
pub const FAILING_SESSION: &str = "boom";

#[derive(Default)]
struct Recorded {
    sessions: Value,
    providers: Value,
    permissions: Value,
    missing: HashSet<String>,
    prompts: Vec<String>,
    prompt_texts: Vec<String>,
    summaries: Vec<Value>,
    replies: Vec<(String, Value)>,
    directories: Vec<String>,
}

type Shared = Arc<Mutex<Recorded>>;

/// In-process stand-in for `opencode serve`.
pub struct FakeServer {
    pub url: String,
    recorded: Shared,
}

impl FakeServer {
    pub async fn start() -> Self {
        let recorded: Shared = Arc::new(Mutex::new(Recorded {
            sessions: json!([]),
            providers: json!({ "providers": [], "default": {} }),
            permissions: json!([]),
            ..Default::default()
        }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let app = router(recorded.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            url: format!("http://{addr}"),
            recorded,
        }
    }

    pub fn sessions(&self, sessions: Value) {
        self.recorded.lock().unwrap().sessions = sessions;
    }

    pub fn providers(&self, providers: Value) {
        self.recorded.lock().unwrap().providers = providers;
    }

    pub fn permissions(&self, permissions: Value) {
        self.recorded.lock().unwrap().permissions = permissions;
    }

    /// Prompts to `id` answer 404.
    pub fn missing_session(&self, id: &str) {
        self.recorded.lock().unwrap().missing.insert(id.to_string());
    }

    /// Session ids that received a prompt, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.recorded.lock().unwrap().prompts.clone()
    }

    pub fn prompt_texts(&self) -> Vec<String> {
        self.recorded.lock().unwrap().prompt_texts.clone()
    }

    pub fn summaries(&self) -> Vec<Value> {
        self.recorded.lock().unwrap().summaries.clone()
    }

    pub fn replies(&self) -> Vec<(String, Value)> {
        self.recorded.lock().unwrap().replies.clone()
    }

    /// Directory headers seen on session creation.
    pub fn created_in(&self) -> Vec<String> {
        self.recorded.lock().unwrap().directories.clone()
    }
}

fn summary(id: &str, directory: &str) -> Value {
    json!({ "id": id, "directory": directory, "time": { "created": 1, "updated": 2 } })
}

fn scoped(headers: &HeaderMap) -> String {
    headers
        .get("x-opencode-directory")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("/w")
        .to_string()
}

fn session_reply(id: &str, headers: &HeaderMap, body: Value) -> (StatusCode, Json<Value>) {
    if id == FAILING_SESSION {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({})));
    }
    let mut reply = summary(id, &scoped(headers));
    if let (Some(reply), Value::Object(extra)) = (reply.as_object_mut(), body) {
        reply.extend(extra);
    }
    (StatusCode::OK, Json(reply))
}

fn ok_unless_failing(id: &str) -> (StatusCode, Json<Value>) {
    if id == FAILING_SESSION {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({})))
    } else {
        (StatusCode::OK, Json(json!(true)))
    }
}

fn router(recorded: Shared) -> Router {
    Router::new()
        .route(
            "/session",
            post(|State(r): State<Shared>, headers: HeaderMap| async move {
                let directory = scoped(&headers);
                r.lock().unwrap().directories.push(directory.clone());
                Json(summary("ses_new", &directory))
            })
            .get(|State(r): State<Shared>| async move {
                Json(r.lock().unwrap().sessions.clone())
            }),
        )
        .route(
            "/session/{id}",
            patch(
                |Path(id): Path<String>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    session_reply(&id, &headers, json!({ "title": body["title"] }))
                },
            )
            .delete(|Path(id): Path<String>| async move { ok_unless_failing(&id) }),
        )
        .route(
            "/session/{id}/fork",
            post(|Path(id): Path<String>, headers: HeaderMap| async move {
                session_reply(&format!("{id}_fork"), &headers, json!({}))
            }),
        )
        .route(
            "/session/{id}/share",
            post(|Path(id): Path<String>, headers: HeaderMap| async move {
                session_reply(
                    &id,
                    &headers,
                    json!({ "share": { "url": format!("https://share.test/{id}") } }),
                )
            })
            .delete(|Path(id): Path<String>, headers: HeaderMap| async move {
                session_reply(&id, &headers, json!({}))
            }),
        )
        .route(
            "/session/{id}/summarize",
            post(
                |State(r): State<Shared>, Path(id): Path<String>, Json(body): Json<Value>| async move {
                    r.lock().unwrap().summaries.push(body);
                    ok_unless_failing(&id)
                },
            ),
        )
        .route(
            "/session/{id}/message",
            post(
                |State(r): State<Shared>, Path(id): Path<String>, Json(body): Json<Value>| async move {
                    let mut r = r.lock().unwrap();
                    r.prompts.push(id.clone());
                    if r.missing.contains(&id) {
                        return (StatusCode::NOT_FOUND, Json(json!({})));
                    }
                    let text = body["parts"][0]["text"].as_str().unwrap_or_default();
                    r.prompt_texts.push(text.to_string());
                    ok_unless_failing(&id)
                },
            ),
        )
        .route(
            "/session/{id}/abort",
            post(|Path(id): Path<String>| async move { ok_unless_failing(&id) }),
        )
        .route(
            "/session/{id}/todo",
            get(|| async { Json(json!([])) }),
        )
        .route(
            "/session/{id}/diff",
            get(|| async { Json(json!([{ "file": "a.rs", "additions": 1, "deletions": 0 }])) }),
        )
        .route(
            "/session/{id}/command",
            post(|Path(id): Path<String>| async move { ok_unless_failing(&id) }),
        )
        .route(
            "/session/{id}/shell",
            post(|Path(id): Path<String>| async move { ok_unless_failing(&id) }),
        )
        .route(
            "/config/providers",
            get(|State(r): State<Shared>| async move {
                Json(r.lock().unwrap().providers.clone())
            }),
        )
        .route(
            "/permission",
            get(|State(r): State<Shared>| async move {
                Json(r.lock().unwrap().permissions.clone())
            }),
        )
        .route(
            "/permission/{id}/reply",
            post(
                |State(r): State<Shared>, Path(id): Path<String>, Json(body): Json<Value>| async move {
                    r.lock().unwrap().replies.push((id, body));
                    Json(json!(true))
                },
            ),
        )
        .with_state(recorded)
}
