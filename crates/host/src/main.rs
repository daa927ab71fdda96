//! ocgui host
//!
//! Runs next to an editor extension: supervises a local `opencode serve`,
//! follows its event stream and drives session and context actions over a
//! newline-delimited JSON bridge on stdio.

mod app;
mod bridge;
mod cmd_probe;
mod command_input;
mod config;
mod context_actions;
mod context_payload;
mod git;
mod logging;
mod menus;
mod paths;
mod reconcile;
mod router;
mod session_actions;
mod session_picker;
mod state;
mod status_bar;
#[cfg(test)]
mod test_support;
mod workbench;
mod workspace_state;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

use crate::app::HostApp;
use crate::bridge::{spawn_reader, spawn_writer, PendingReplies, StdioWorkbench};
use crate::config::{Cli, Command, HostConfig};
use crate::logging::LogOptions;
use crate::state::HostState;
use crate::workspace_state::WorkspaceState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    paths::init_data_dir(cli.data_dir.as_deref());
    paths::ensure_dirs()?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Probe => {
            let _logging = logging::init_logging(&cli.log)?;
            cmd_probe::run(&cli.host).await
        }
        Command::Run => run_host(cli.host, &cli.log).await,
    }
}

async fn run_host(config: HostConfig, log: &LogOptions) -> anyhow::Result<()> {
    let logging = logging::init_logging(log)?;
    let scope = match config.workspace_dir() {
        Some(dir) => dir,
        None => std::env::current_dir()?.to_string_lossy().into_owned(),
    };
    info!(
        component = "host",
        event = "host.start",
        run_id = %logging.run_id,
        version = VERSION,
        workspace = %scope,
        opencode = %config.opencode_path,
        "Starting ocgui host"
    );

    let (host_tx, host_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let pending = Arc::new(PendingReplies::default());

    let writer = spawn_writer(tokio::io::stdout(), out_rx);
    spawn_reader(tokio::io::stdin(), pending.clone(), host_tx.clone());

    let state = HostState::restore(WorkspaceState::load(paths::workspace_state_path(), scope));
    let workbench = Arc::new(StdioWorkbench::new(out_tx, pending));
    let app = HostApp::new(
        config.server_options(),
        config.server_auth(),
        state,
        workbench,
        host_tx,
    );

    app::run(app, host_rx).await;
    // The writer ends once the app and its workbench are gone.
    let _ = writer.await;

    info!(component = "host", event = "host.stop", "ocgui host stopped");
    Ok(())
}
