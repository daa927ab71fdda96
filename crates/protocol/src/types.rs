//! Core types shared across the protocol

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Directory value the server uses for events that are not scoped to a workspace.
pub const GLOBAL_DIRECTORY: &str = "global";

/// A remote session, addressed by (directory, id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub directory: String,
}

impl SessionInfo {
    pub fn new(id: impl Into<String>, directory: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            directory: directory.into(),
        }
    }
}

/// Share link attached to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareInfo {
    pub url: String,
}

/// Session timestamps (milliseconds since the epoch)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTime {
    pub updated: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived: Option<i64>,
}

/// Server-reported session metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub directory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share: Option<ShareInfo>,
    pub time: SessionTime,
}

impl SessionSummary {
    pub fn info(&self) -> SessionInfo {
        SessionInfo::new(self.id.clone(), self.directory.clone())
    }

    pub fn is_archived(&self) -> bool {
        self.time.archived.is_some()
    }

    pub fn share_url(&self) -> Option<&str> {
        self.share.as_ref().map(|s| s.url.as_str())
    }
}

/// One model offered by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderModel {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A configured model provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub id: String,
    pub name: String,
    /// Models in the order the server declared them
    pub models: Vec<ProviderModel>,
}

impl ProviderSummary {
    pub fn model(&self, id: &str) -> Option<&ProviderModel> {
        self.models.iter().find(|m| m.id == id)
    }
}

/// Response of `GET /config/providers`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigProviders {
    pub providers: Vec<ProviderSummary>,
    /// provider id -> default model id
    pub defaults: Vec<(String, String)>,
}

impl ConfigProviders {
    pub fn default_model(&self, provider_id: &str) -> Option<&str> {
        self.defaults
            .iter()
            .find(|(provider, _)| provider == provider_id)
            .map(|(_, model)| model.as_str())
    }
}

/// Tool call that triggered a permission request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTool {
    #[serde(rename = "messageID")]
    pub message_id: String,
    #[serde(rename = "callID")]
    pub call_id: String,
}

/// A pending approval request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub id: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub permission: String,
    pub patterns: Vec<String>,
    pub metadata: Map<String, Value>,
    pub always: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<PermissionTool>,
}

/// Reply verb for a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionReply {
    Once,
    Always,
    Reject,
}

impl PermissionReply {
    pub const ALL: [PermissionReply; 3] = [Self::Once, Self::Always, Self::Reject];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Always => "always",
            Self::Reject => "reject",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Once => "Allow Once",
            Self::Always => "Always Allow",
            Self::Reject => "Reject",
        }
    }
}

/// One entry of a session's todo list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTodo {
    pub id: String,
    pub content: String,
    pub status: String,
    pub priority: String,
}

/// Credentials for the server's Basic auth
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAuth {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ServerAuth {
    /// Identity used to decide whether two connections are equivalent.
    pub fn key(auth: Option<&ServerAuth>) -> String {
        match auth {
            Some(auth) => format!(
                "{}:{}",
                auth.username.as_deref().unwrap_or_default(),
                auth.password.as_deref().unwrap_or_default()
            ),
            None => String::new(),
        }
    }
}

/// Derived run state of the active session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRuntimeState {
    #[default]
    Idle,
    Busy,
    Retry,
    Error,
}

impl SessionRuntimeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Retry => "retry",
            Self::Error => "error",
        }
    }
}

/// Typed part of an event envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
}

/// One notification from `GET /event`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalEventEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<EventPayload>,
}

impl GlobalEventEnvelope {
    pub fn event_type(&self) -> Option<&str> {
        self.payload.as_ref()?.event_type.as_deref()
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.payload.as_ref()?.properties.as_ref()?.get(key)
    }

    /// The envelope directory, unless it is the global sentinel.
    pub fn scoped_directory(&self) -> Option<&str> {
        self.directory
            .as_deref()
            .filter(|directory| *directory != GLOBAL_DIRECTORY)
    }
}

/// Embedded surface hosting the opencode UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Sidebar,
    Panel,
}
