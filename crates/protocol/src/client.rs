//! Surface → Host messages

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Messages posted by an embedded surface to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// The content frame finished loading `url`
    #[serde(rename = "ready")]
    Ready {
        #[serde(default, deserialize_with = "lossy_string")]
        url: String,
    },
    #[serde(rename = "action-new-session")]
    NewSession,
    #[serde(rename = "action-session-menu")]
    SessionMenu,
    #[serde(rename = "action-review-permissions")]
    ReviewPermissions,
    #[serde(rename = "action-attach-menu")]
    AttachMenu,
    #[serde(rename = "action-send-context")]
    SendContext,
    #[serde(rename = "action-prompt")]
    Prompt {
        #[serde(default, deserialize_with = "string_or_empty")]
        text: String,
    },
    #[serde(rename = "action-switch-session")]
    SwitchSession,
    #[serde(rename = "action-open-panel")]
    OpenPanel,
    #[serde(rename = "action-show-todo")]
    ShowTodo,
    #[serde(rename = "action-show-diff")]
    ShowDiff,
    #[serde(rename = "action-run-command")]
    RunCommand,
    #[serde(rename = "action-run-shell")]
    RunShell,
    #[serde(rename = "action-abort-session")]
    AbortSession,
    #[serde(rename = "action-open-reference")]
    OpenReference,
    #[serde(rename = "action-refresh")]
    Refresh,
    #[serde(rename = "frame-error")]
    FrameError,
}

impl ClientMessage {
    /// Decode an untrusted surface message.
    ///
    /// Returns `None` for non-objects, a missing or non-string `type`, unknown
    /// types, and prompts that are empty after trimming.
    pub fn from_value(value: &Value) -> Option<Self> {
        let kind = value.as_object()?.get("type")?;
        if !kind.is_string() {
            return None;
        }

        match serde_json::from_value::<ClientMessage>(value.clone()).ok()? {
            ClientMessage::Prompt { text } => {
                let text = text.trim();
                if text.is_empty() {
                    return None;
                }
                Some(ClientMessage::Prompt {
                    text: text.to_string(),
                })
            }
            other => Some(other),
        }
    }
}

fn lossy_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}
