//! opencode connector
//!
//! Everything needed to drive a local `opencode serve` process: spawning and
//! supervising it, calling its HTTP API and following its event stream.

pub mod api;
pub mod events;
pub mod server_manager;

pub use api::{pick_active_session, OpencodeClient};
pub use events::{parse_sse_data_line, EventSink, EventStreamClient};
pub use server_manager::{
    parse_server_url_from_output, ExitHook, ListenLineDetector, ReadinessDetector, ServerExit,
    ServerManager, ServerOptions,
};

use thiserror::Error;

/// Errors that can occur while talking to the opencode server
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP {status}")]
    Status { status: u16 },

    /// 404 on a session-scoped call; callers may recover by recreating the session
    #[error("HTTP 404")]
    NotFound,

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Validation(&'static str),

    #[error(transparent)]
    Start(#[from] StartError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound)
    }
}

/// Errors that can occur while starting the server process.
///
/// Clone so every caller awaiting the same start observes the same failure.
#[derive(Debug, Clone, Error)]
pub enum StartError {
    #[error("Failed to spawn {command}: {message}")]
    Spawn { command: String, message: String },

    #[error("Timeout waiting for opencode server startup after {timeout_ms}ms. Output:\n{}", or_empty(.output))]
    Timeout { timeout_ms: u64, output: String },

    #[error("opencode server exited before ready (code={}, signal={}). Output:\n{}", display_opt(.code), display_opt(.signal), or_empty(.output))]
    ProcessExit {
        code: Option<i32>,
        signal: Option<i32>,
        output: String,
    },
}

fn or_empty(output: &str) -> &str {
    if output.is_empty() {
        "<empty>"
    } else {
        output
    }
}

fn display_opt(value: &Option<i32>) -> String {
    value.map_or_else(|| "null".to_string(), |v| v.to_string())
}
