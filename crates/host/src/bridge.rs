//! Stdio editor bridge
//!
//! One JSON frame per line in each direction. The reader task resolves
//! replies to pending editor requests directly, so an action awaiting a
//! dialog never blocks the host queue it is running on; every other frame is
//! forwarded to the host task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ocgui_protocol::editor::{
    ActiveFile, InputOptions, MessageLevel, PickItem, SurfaceContent, SymbolHit,
};
use ocgui_protocol::{
    new_id, EditorRequest, HostMessage, InboundFrame, LineRange, OutboundFrame, Surface,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app::HostInput;
use crate::workbench::Workbench;

/// Editor requests awaiting a reply, keyed by request id.
#[derive(Default)]
pub struct PendingReplies {
    inner: Mutex<PendingInner>,
}

#[derive(Default)]
struct PendingInner {
    waiting: HashMap<String, oneshot::Sender<Value>>,
    closed: bool,
}

impl PendingReplies {
    /// Register `id`; `None` once the editor has gone away.
    fn register(&self, id: &str) -> Option<oneshot::Receiver<Value>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        inner.waiting.insert(id.to_string(), tx);
        Some(rx)
    }

    /// Deliver a reply; false when nobody is waiting for `id`.
    pub fn resolve(&self, id: &str, value: Value) -> bool {
        let sender = self.inner.lock().unwrap().waiting.remove(id);
        match sender {
            Some(tx) => {
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }

    /// Resolve everything outstanding as dismissed and refuse new requests.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        inner.waiting.clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap().waiting.len()
    }
}

/// `Workbench` backed by `EditorRequest` frames.
pub struct StdioWorkbench {
    out: mpsc::UnboundedSender<OutboundFrame>,
    pending: Arc<PendingReplies>,
}

impl StdioWorkbench {
    pub fn new(out: mpsc::UnboundedSender<OutboundFrame>, pending: Arc<PendingReplies>) -> Self {
        Self { out, pending }
    }

    fn notify(&self, request: EditorRequest) {
        if self
            .out
            .send(OutboundFrame::Editor { id: None, request })
            .is_err()
        {
            debug!(
                component = "bridge",
                event = "bridge.send_after_close",
                "Dropping editor notification, writer is gone"
            );
        }
    }

    /// Send `request` and wait for its reply; `Null` when dismissed or closed.
    async fn request(&self, request: EditorRequest) -> Value {
        let id = new_id();
        let Some(rx) = self.pending.register(&id) else {
            return Value::Null;
        };
        if self
            .out
            .send(OutboundFrame::Editor {
                id: Some(id.clone()),
                request,
            })
            .is_err()
        {
            self.pending.resolve(&id, Value::Null);
        }
        rx.await.unwrap_or(Value::Null)
    }

    async fn request_as<T: DeserializeOwned + Default>(&self, request: EditorRequest) -> T {
        let value = self.request(request).await;
        if value.is_null() {
            return T::default();
        }
        serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(
                component = "bridge",
                event = "bridge.reply.invalid",
                error = %e,
                "Ignoring malformed editor reply"
            );
            T::default()
        })
    }
}

#[async_trait]
impl Workbench for StdioWorkbench {
    async fn show_message(&self, level: MessageLevel, message: &str) {
        self.notify(EditorRequest::ShowMessage {
            level,
            message: message.to_string(),
        });
    }

    async fn confirm(&self, message: &str, action: &str) -> bool {
        self.request(EditorRequest::Confirm {
            message: message.to_string(),
            action: action.to_string(),
        })
        .await
        .as_bool()
        .unwrap_or(false)
    }

    async fn quick_pick(&self, title: &str, items: Vec<PickItem>) -> Option<usize> {
        let len = items.len();
        let value = self
            .request(EditorRequest::QuickPick {
                title: title.to_string(),
                items,
            })
            .await;
        value
            .as_u64()
            .map(|index| index as usize)
            .filter(|index| *index < len)
    }

    async fn input_box(&self, options: InputOptions) -> Option<String> {
        match self.request(EditorRequest::InputBox { options }).await {
            Value::String(text) => Some(text),
            _ => None,
        }
    }

    async fn read_clipboard(&self) -> String {
        match self.request(EditorRequest::ReadClipboard).await {
            Value::String(text) => text,
            _ => String::new(),
        }
    }

    async fn write_clipboard(&self, text: &str) {
        self.notify(EditorRequest::WriteClipboard {
            text: text.to_string(),
        });
    }

    async fn reveal_view(&self) {
        self.notify(EditorRequest::RevealView);
    }

    async fn open_panel(&self) {
        self.notify(EditorRequest::OpenPanel);
    }

    async fn render_surface(&self, surface: Surface, content: SurfaceContent) {
        self.notify(EditorRequest::RenderSurface { surface, content });
    }

    async fn post_message(&self, surface: Surface, message: HostMessage) {
        let _ = self.out.send(OutboundFrame::Webview { surface, message });
    }

    async fn set_status(&self, text: &str, tooltip: &str) {
        self.notify(EditorRequest::SetStatus {
            text: text.to_string(),
            tooltip: tooltip.to_string(),
        });
    }

    async fn open_document(&self, content: &str, language: &str) {
        self.notify(EditorRequest::OpenDocument {
            content: content.to_string(),
            language: language.to_string(),
        });
    }

    async fn open_file(&self, path: &str, range: Option<LineRange>) -> bool {
        self.request(EditorRequest::OpenFile {
            path: path.to_string(),
            range,
        })
        .await
        .as_bool()
        .unwrap_or(false)
    }

    async fn active_file(&self) -> Option<ActiveFile> {
        self.request_as(EditorRequest::ActiveFile).await
    }

    async fn workspace_files(&self) -> Vec<String> {
        self.request_as(EditorRequest::ListWorkspaceFiles).await
    }

    async fn workspace_symbols(&self, query: &str) -> Vec<SymbolHit> {
        self.request_as(EditorRequest::WorkspaceSymbols {
            query: query.to_string(),
        })
        .await
    }

    async fn workspace_folders(&self) -> Vec<String> {
        self.request_as(EditorRequest::WorkspaceFolders).await
    }

    async fn default_directory(&self) -> Option<String> {
        self.request_as::<Option<String>>(EditorRequest::DefaultDirectory)
            .await
            .filter(|dir| !dir.is_empty())
    }
}

/// Read inbound frames until EOF.
///
/// Replies go to `pending`; everything else to `host`. EOF closes `pending`
/// and sends [`HostInput::Closed`].
pub fn spawn_reader<R>(
    reader: R,
    pending: Arc<PendingReplies>,
    host: mpsc::UnboundedSender<HostInput>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(
                        component = "bridge",
                        event = "bridge.read_failed",
                        error = %e,
                        "Failed to read from editor"
                    );
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<InboundFrame>(&line) {
                Ok(InboundFrame::Reply { id, value }) => {
                    if !pending.resolve(&id, value.clone()) {
                        let _ = host.send(HostInput::Frame(InboundFrame::Reply { id, value }));
                    }
                }
                Ok(frame) => {
                    if host.send(HostInput::Frame(frame)).is_err() {
                        break;
                    }
                }
                Err(e) => warn!(
                    component = "bridge",
                    event = "bridge.frame.invalid",
                    error = %e,
                    "Dropping malformed inbound frame"
                ),
            }
        }

        pending.close();
        let _ = host.send(HostInput::Closed);
    })
}

/// Write outbound frames, one per line, until every sender is dropped.
pub fn spawn_writer<W>(writer: W, mut rx: mpsc::UnboundedReceiver<OutboundFrame>) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut writer = writer;
        while let Some(frame) = rx.recv().await {
            let mut line = match serde_json::to_vec(&frame) {
                Ok(line) => line,
                Err(e) => {
                    warn!(
                        component = "bridge",
                        event = "bridge.frame.encode_failed",
                        error = %e,
                        "Failed to encode outbound frame"
                    );
                    continue;
                }
            };
            line.push(b'\n');
            if let Err(e) = async {
                writer.write_all(&line).await?;
                writer.flush().await
            }
            .await
            {
                warn!(
                    component = "bridge",
                    event = "bridge.write_failed",
                    error = %e,
                    "Failed to write to editor"
                );
                break;
            }
        }
    })
}
