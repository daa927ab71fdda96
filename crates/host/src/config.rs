//! Command line and environment configuration

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use ocgui_opencode::ServerOptions;
use ocgui_protocol::ServerAuth;

use crate::logging::LogOptions;

#[derive(Debug, Parser)]
#[command(name = "ocgui", version, about = "Editor host for a local opencode server")]
pub struct Cli {
    /// Data directory for logs and workspace state
    #[arg(long, env = "OCGUI_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(flatten)]
    pub host: HostConfig,

    #[command(flatten)]
    pub log: LogOptions,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Serve the editor bridge over stdio (default)
    Run,
    /// Start the server once, list sessions and exit
    Probe,
}

#[derive(Debug, Clone, Args)]
pub struct HostConfig {
    /// opencode executable
    #[arg(long, env = "OCGUI_OPENCODE_PATH", default_value = "opencode", global = true)]
    pub opencode_path: String,

    /// Extra arguments appended to `opencode serve`
    #[arg(
        long = "serve-arg",
        env = "OCGUI_SERVE_ARGS",
        value_delimiter = ' ',
        allow_hyphen_values = true,
        global = true
    )]
    pub serve_args: Vec<String>,

    /// Milliseconds to wait for the server to report its URL
    #[arg(long, env = "OCGUI_START_TIMEOUT_MS", default_value_t = 20_000, global = true)]
    pub start_timeout_ms: u64,

    #[arg(long, env = "OCGUI_SERVER_USERNAME", global = true)]
    pub server_username: Option<String>,

    #[arg(long, env = "OPENCODE_SERVER_PASSWORD", hide_env_values = true, global = true)]
    pub server_password: Option<String>,

    /// Workspace folder; the server runs here and state is scoped to it
    #[arg(long, env = "OCGUI_WORKSPACE", global = true)]
    pub workspace: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            opencode_path: "opencode".to_string(),
            serve_args: Vec::new(),
            start_timeout_ms: 20_000,
            server_username: None,
            server_password: None,
            workspace: None,
        }
    }
}

impl HostConfig {
    /// Basic auth credentials; absent unless a password is set.
    pub fn server_auth(&self) -> Option<ServerAuth> {
        let password = self.server_password.as_deref().filter(|p| !p.is_empty())?;
        Some(ServerAuth {
            username: self.server_username.clone().filter(|u| !u.is_empty()),
            password: Some(password.to_string()),
        })
    }

    pub fn workspace_dir(&self) -> Option<String> {
        self.workspace
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
    }

    /// `serve --hostname=127.0.0.1 --port=0` plus any extra arguments.
    pub fn server_options(&self) -> ServerOptions {
        let mut args = vec![
            "serve".to_string(),
            "--hostname=127.0.0.1".to_string(),
            "--port=0".to_string(),
        ];
        args.extend(self.serve_args.iter().filter(|a| !a.is_empty()).cloned());

        let mut options = ServerOptions::new(self.opencode_path.clone())
            .args(args)
            .timeout(Duration::from_millis(self.start_timeout_ms));
        if let Some(cwd) = self.workspace_dir() {
            options = options.cwd(cwd);
        }
        options
    }
}
