//! Host ⇄ editor bridge frames
//!
//! The host process talks to the editor extension over stdio, one JSON frame
//! per line. Inbound frames carry surface messages, palette commands and
//! replies to earlier requests; outbound frames carry surface messages and
//! editor requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::host::HostMessage;
use crate::reference::LineRange;
use crate::types::Surface;

// ---------------------------------------------------------------------------
// Inbound (editor → host)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum InboundFrame {
    /// A message posted by an embedded surface; decoded lazily since surfaces
    /// are untrusted.
    Webview {
        surface: Surface,
        #[serde(default)]
        message: Value,
    },
    /// A palette command invoked in the editor
    Command { command: EditorCommand },
    /// Answer to an `EditorRequest` carrying an id
    Reply {
        id: String,
        #[serde(default)]
        value: Value,
    },
    /// A surface was created or torn down by the editor
    Surface {
        surface: Surface,
        event: SurfaceEvent,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceEvent {
    Opened,
    Closed,
}

/// Palette commands contributed by the extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum EditorCommand {
    Open,
    OpenPanel,
    Refresh,
    NewSession,
    SwitchSession,
    SessionActions,
    RenameSession,
    DeleteSession,
    ForkSession,
    ShareSession,
    UnshareSession,
    CompactSession,
    AttachFile,
    AttachExplorerFiles {
        #[serde(default)]
        paths: Vec<String>,
    },
    AttachSymbol,
    AttachGitDiff,
    CopyFileReference,
    SendContext,
    AbortSession,
    OpenReference,
    ReviewPermissions,
    ShowTodo,
    ShowDiff,
    RunCommand,
    RunShell,
}

/// Reply payload keyed by the request id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorReply {
    pub id: String,
    #[serde(default)]
    pub value: Value,
}

// ---------------------------------------------------------------------------
// Outbound (host → editor)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum OutboundFrame {
    Webview {
        surface: Surface,
        message: HostMessage,
    },
    Editor {
        /// Present when the host awaits a reply
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        request: EditorRequest,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// One quick-pick row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickItem {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl PickItem {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: None,
            detail: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Input box options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputOptions {
    pub title: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Editor-side validation: reject blank input
    #[serde(default)]
    pub required: bool,
}

/// What a surface should display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SurfaceContent {
    /// The opencode UI served from `server_url`
    Frame { server_url: String, title: String },
    /// A plain status page
    Message { text: String },
}

/// The file focused in the editor, relative to its workspace folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveFile {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<LineRange>,
}

/// A workspace symbol search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolHit {
    pub name: String,
    pub kind: String,
    /// Workspace-relative path
    pub path: String,
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EditorRequest {
    ShowMessage {
        level: MessageLevel,
        message: String,
    },
    /// Modal confirmation; replies `true` when `action` was chosen
    Confirm { message: String, action: String },
    /// Replies with the picked index or `null`
    QuickPick { title: String, items: Vec<PickItem> },
    /// Replies with the entered text or `null` when dismissed
    InputBox { options: InputOptions },
    ReadClipboard,
    WriteClipboard { text: String },
    RevealView,
    OpenPanel,
    RenderSurface {
        surface: Surface,
        content: SurfaceContent,
    },
    SetStatus { text: String, tooltip: String },
    OpenDocument { content: String, language: String },
    /// Replies `true` when the file exists in the workspace
    OpenFile {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        range: Option<LineRange>,
    },
    ActiveFile,
    ListWorkspaceFiles,
    WorkspaceSymbols { query: String },
    WorkspaceFolders,
    DefaultDirectory,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_webview_frame_with_raw_message() {
        let frame: InboundFrame = serde_json::from_str(
            r#"{"source":"webview","surface":"panel","message":{"type":"action-refresh"}}"#,
        )
        .expect("parse frame");
        match frame {
            InboundFrame::Webview { surface, message } => {
                assert_eq!(surface, Surface::Panel);
                assert_eq!(message, json!({"type":"action-refresh"}));
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn parses_command_with_arguments() {
        let frame: InboundFrame = serde_json::from_str(
            r#"{"source":"command","command":{"name":"attach-explorer-files","paths":["/w/a.rs"]}}"#,
        )
        .expect("parse frame");
        assert_eq!(
            frame,
            InboundFrame::Command {
                command: EditorCommand::AttachExplorerFiles {
                    paths: vec!["/w/a.rs".into()]
                }
            }
        );
    }

    #[test]
    fn reply_value_defaults_to_null() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"source":"reply","id":"r1"}"#).expect("parse frame");
        assert_eq!(
            frame,
            InboundFrame::Reply {
                id: "r1".into(),
                value: Value::Null
            }
        );
    }

    #[test]
    fn notification_frames_omit_id() {
        let frame = OutboundFrame::Editor {
            id: None,
            request: EditorRequest::SetStatus {
                text: "$(globe) OpenCode GUI".into(),
                tooltip: "Server: disconnected".into(),
            },
        };
        let value = serde_json::to_value(&frame).expect("serialize");
        assert_eq!(
            value,
            json!({
                "target": "editor",
                "request": {
                    "kind": "set-status",
                    "text": "$(globe) OpenCode GUI",
                    "tooltip": "Server: disconnected"
                }
            })
        );
    }
}
