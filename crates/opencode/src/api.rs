//! Typed client for the opencode HTTP API
//!
//! Every call targets the base URL handed out by the server manager. Auth and
//! directory scoping travel as headers. Responses are validated field by
//! field: a missing required field fails the call with
//! [`ClientError::Validation`], unknown fields are ignored, and malformed
//! nested entries are dropped.

use base64::Engine;
use ocgui_protocol::{
    ConfigProviders, PermissionReply, PermissionRequest, PermissionTool, ProviderModel,
    ProviderSummary, ServerAuth, SessionSummary, SessionTodo,
};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::ClientError;

pub const DIRECTORY_HEADER: &str = "x-opencode-directory";
const DEFAULT_USERNAME: &str = "opencode";

/// `Authorization` header value, when a password is configured.
pub fn auth_header(auth: Option<&ServerAuth>) -> Option<String> {
    let auth = auth?;
    let password = auth.password.as_deref().filter(|p| !p.is_empty())?;
    let username = auth
        .username
        .as_deref()
        .filter(|u| !u.is_empty())
        .unwrap_or(DEFAULT_USERNAME);
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    Some(format!("Basic {encoded}"))
}

/// Most recently updated session that is not archived.
pub fn pick_active_session(sessions: &[SessionSummary]) -> Option<&SessionSummary> {
    sessions
        .iter()
        .filter(|session| !session.is_archived())
        .max_by_key(|session| session.time.updated)
}

/// Body of `POST /session/{id}/summarize`
#[derive(Debug, Clone, Serialize)]
pub struct SummarizeRequest {
    #[serde(rename = "providerID")]
    pub provider_id: String,
    #[serde(rename = "modelID")]
    pub model_id: String,
    pub auto: bool,
}

/// Body of `POST /session/{id}/command`
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommandRequest {
    pub command: String,
    pub arguments: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(rename = "messageID", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReplyBody<'a> {
    reply: PermissionReply,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct OpencodeClient {
    http: reqwest::Client,
    base_url: String,
    auth: Option<ServerAuth>,
}

impl OpencodeClient {
    pub fn new(base_url: impl Into<String>, auth: Option<ServerAuth>) -> Self {
        Self::with_http(reqwest::Client::new(), base_url, auth)
    }

    /// Reuse an existing connection pool.
    pub fn with_http(
        http: reqwest::Client,
        base_url: impl Into<String>,
        auth: Option<ServerAuth>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            auth,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> Option<&ServerAuth> {
        self.auth.as_ref()
    }

    // -- Sessions -------------------------------------------------------------

    pub async fn create_session(
        &self,
        directory: Option<&str>,
    ) -> Result<SessionSummary, ClientError> {
        let response = self
            .send(self.request(Method::POST, "/session", directory).json(&json!({})))
            .await?;
        session_summary(response.json().await?)
    }

    pub async fn list_sessions(
        &self,
        directory: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<SessionSummary>, ClientError> {
        let mut request = self.request(Method::GET, "/session", directory);
        if let Some(limit) = limit.filter(|l| *l > 0) {
            request = request.query(&[("limit", limit)]);
        }
        let data: Value = self.send(request).await?.json().await?;
        let Value::Array(items) = data else {
            return Err(ClientError::Validation("Invalid session list response"));
        };
        items.into_iter().map(session_summary).collect()
    }

    pub async fn rename_session(
        &self,
        directory: Option<&str>,
        session_id: &str,
        title: &str,
    ) -> Result<SessionSummary, ClientError> {
        let path = format!("/session/{session_id}");
        let request = self
            .request(Method::PATCH, &path, directory)
            .json(&json!({ "title": title }));
        session_summary(self.send(request).await?.json().await?)
    }

    pub async fn delete_session(
        &self,
        directory: Option<&str>,
        session_id: &str,
    ) -> Result<(), ClientError> {
        let path = format!("/session/{session_id}");
        self.send(self.request(Method::DELETE, &path, directory))
            .await?;
        Ok(())
    }

    pub async fn fork_session(
        &self,
        directory: Option<&str>,
        session_id: &str,
    ) -> Result<SessionSummary, ClientError> {
        let path = format!("/session/{session_id}/fork");
        let request = self.request(Method::POST, &path, directory).json(&json!({}));
        session_summary(self.send(request).await?.json().await?)
    }

    pub async fn share_session(
        &self,
        directory: Option<&str>,
        session_id: &str,
    ) -> Result<SessionSummary, ClientError> {
        let path = format!("/session/{session_id}/share");
        let request = self.request(Method::POST, &path, directory).json(&json!({}));
        session_summary(self.send(request).await?.json().await?)
    }

    pub async fn unshare_session(
        &self,
        directory: Option<&str>,
        session_id: &str,
    ) -> Result<SessionSummary, ClientError> {
        let path = format!("/session/{session_id}/share");
        let request = self.request(Method::DELETE, &path, directory);
        session_summary(self.send(request).await?.json().await?)
    }

    pub async fn summarize_session(
        &self,
        directory: Option<&str>,
        session_id: &str,
        body: &SummarizeRequest,
    ) -> Result<(), ClientError> {
        let path = format!("/session/{session_id}/summarize");
        self.send(self.request(Method::POST, &path, directory).json(body))
            .await?;
        Ok(())
    }

    pub async fn prompt_session_with_text(
        &self,
        directory: Option<&str>,
        session_id: &str,
        text: &str,
    ) -> Result<(), ClientError> {
        let path = format!("/session/{session_id}/message");
        let body = json!({ "parts": [{ "type": "text", "text": text }] });
        self.send(self.request(Method::POST, &path, directory).json(&body))
            .await?;
        Ok(())
    }

    pub async fn abort_session(
        &self,
        directory: Option<&str>,
        session_id: &str,
    ) -> Result<(), ClientError> {
        let path = format!("/session/{session_id}/abort");
        self.send(self.request(Method::POST, &path, directory).json(&json!({})))
            .await?;
        Ok(())
    }

    pub async fn list_session_todos(
        &self,
        directory: Option<&str>,
        session_id: &str,
    ) -> Result<Vec<SessionTodo>, ClientError> {
        let path = format!("/session/{session_id}/todo");
        let data: Value = self
            .send(self.request(Method::GET, &path, directory))
            .await?
            .json()
            .await?;
        let Value::Array(items) = data else {
            return Err(ClientError::Validation("Invalid todo list response"));
        };
        items
            .into_iter()
            .map(|item| {
                serde_json::from_value::<SessionTodo>(item)
                    .map_err(|_| ClientError::Validation("Invalid todo response"))
            })
            .collect()
    }

    /// File diffs are passed through untouched; only the list shape is checked.
    pub async fn get_session_diff(
        &self,
        directory: Option<&str>,
        session_id: &str,
        message_id: Option<&str>,
    ) -> Result<Vec<Value>, ClientError> {
        let path = format!("/session/{session_id}/diff");
        let mut request = self.request(Method::GET, &path, directory);
        if let Some(message_id) = message_id.filter(|m| !m.is_empty()) {
            request = request.query(&[("messageID", message_id)]);
        }
        let data: Value = self.send(request).await?.json().await?;
        match data {
            Value::Array(items) => Ok(items),
            _ => Err(ClientError::Validation("Invalid diff response")),
        }
    }

    pub async fn run_session_command(
        &self,
        directory: Option<&str>,
        session_id: &str,
        body: &CommandRequest,
    ) -> Result<(), ClientError> {
        let path = format!("/session/{session_id}/command");
        self.send(self.request(Method::POST, &path, directory).json(body))
            .await?;
        Ok(())
    }

    pub async fn run_session_shell(
        &self,
        directory: Option<&str>,
        session_id: &str,
        command: &str,
        agent: &str,
    ) -> Result<(), ClientError> {
        let path = format!("/session/{session_id}/shell");
        let body = json!({ "command": command, "agent": agent });
        self.send(self.request(Method::POST, &path, directory).json(&body))
            .await?;
        Ok(())
    }

    // -- Providers & permissions ------------------------------------------------

    pub async fn list_config_providers(
        &self,
        directory: Option<&str>,
    ) -> Result<ConfigProviders, ClientError> {
        let data: Value = self
            .send(self.request(Method::GET, "/config/providers", directory))
            .await?
            .json()
            .await?;
        config_providers(&data)
    }

    pub async fn list_permissions(&self) -> Result<Vec<PermissionRequest>, ClientError> {
        let data: Value = self
            .send(self.request(Method::GET, "/permission", None))
            .await?
            .json()
            .await?;
        let Value::Array(items) = data else {
            return Err(ClientError::Validation("Invalid permission list response"));
        };
        items.iter().map(permission_request).collect()
    }

    pub async fn reply_permission(
        &self,
        request_id: &str,
        reply: PermissionReply,
        message: Option<&str>,
    ) -> Result<(), ClientError> {
        let path = format!("/permission/{request_id}/reply");
        let body = ReplyBody { reply, message };
        self.send(self.request(Method::POST, &path, None).json(&body))
            .await?;
        Ok(())
    }

    // -- Internal helpers -------------------------------------------------------

    fn request(&self, method: Method, path: &str, directory: Option<&str>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let mut request = self.http.request(method, url);
        if let Some(value) = auth_header(self.auth.as_ref()) {
            request = request.header(AUTHORIZATION, value);
        }
        if let Some(directory) = directory.filter(|d| !d.is_empty()) {
            request = request.header(DIRECTORY_HEADER, directory);
        }
        request
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(
            component = "opencode_api",
            event = "opencode.http.response",
            url = %response.url(),
            status = status.as_u16(),
            "opencode API response"
        );
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound);
        }
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

// ---------------------------------------------------------------------------
// Response validation
// ---------------------------------------------------------------------------

fn session_summary(value: Value) -> Result<SessionSummary, ClientError> {
    let invalid = || ClientError::Validation("Invalid session response");
    let summary: SessionSummary = serde_json::from_value(value).map_err(|_| invalid())?;
    if summary.id.is_empty() || summary.directory.is_empty() {
        return Err(invalid());
    }
    Ok(summary)
}

fn config_providers(value: &Value) -> Result<ConfigProviders, ClientError> {
    let invalid = || ClientError::Validation("Invalid config providers response");
    let object = value.as_object().ok_or_else(invalid)?;
    let raw_providers = object
        .get("providers")
        .and_then(Value::as_array)
        .ok_or_else(invalid)?;
    let raw_defaults = object
        .get("default")
        .and_then(Value::as_object)
        .ok_or_else(invalid)?;

    let providers = raw_providers
        .iter()
        .map(|raw| provider_summary(raw).ok_or_else(invalid))
        .collect::<Result<Vec<_>, _>>()?;

    let defaults = raw_defaults
        .iter()
        .filter_map(|(provider, model)| Some((provider.clone(), model.as_str()?.to_string())))
        .collect();

    Ok(ConfigProviders {
        providers,
        defaults,
    })
}

fn provider_summary(value: &Value) -> Option<ProviderSummary> {
    let object = value.as_object()?;
    let id = object.get("id")?.as_str()?;
    let name = object.get("name")?.as_str()?;
    let raw_models = object.get("models")?.as_object()?;

    let mut models: Vec<ProviderModel> = Vec::new();
    for (key, raw) in raw_models {
        let Some(raw) = raw.as_object() else {
            continue;
        };
        let model = ProviderModel {
            id: raw
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or(key)
                .to_string(),
            name: raw.get("name").and_then(Value::as_str).map(str::to_string),
        };
        match models.iter_mut().find(|existing| existing.id == model.id) {
            Some(existing) => *existing = model,
            None => models.push(model),
        }
    }

    Some(ProviderSummary {
        id: id.to_string(),
        name: name.to_string(),
        models,
    })
}

fn permission_request(value: &Value) -> Result<PermissionRequest, ClientError> {
    let invalid = || ClientError::Validation("Invalid permission response");
    let object = value.as_object().ok_or_else(invalid)?;
    let text = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(invalid)
    };

    Ok(PermissionRequest {
        id: text("id")?,
        session_id: text("sessionID")?,
        permission: text("permission")?,
        patterns: string_list(object.get("patterns")),
        metadata: object
            .get("metadata")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(Map::new),
        always: string_list(object.get("always")),
        tool: object.get("tool").and_then(Value::as_object).map(|tool| {
            let field = |key: &str| {
                tool.get(key)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            PermissionTool {
                message_id: field("messageID"),
                call_id: field("callID"),
            }
        }),
    })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
