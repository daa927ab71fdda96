//! `ocgui probe`: start the server once and report what it sees.

use ocgui_opencode::{OpencodeClient, ServerManager};

use crate::config::HostConfig;
use crate::session_actions::now_ms;
use crate::session_picker::{format_age, sort_sessions_for_picker};

const SESSION_LIMIT: u32 = 20;

pub async fn run(config: &HostConfig) -> anyhow::Result<()> {
    let options = config.server_options();
    println!();
    println!("  ocgui v{}", crate::VERSION);
    println!("  Command: {} {}", options.command, options.args.join(" "));

    let server = ServerManager::new(options);
    let url = match server.ensure_running().await {
        Ok(url) => url,
        Err(e) => {
            println!("  Server: failed to start");
            println!();
            return Err(e.into());
        }
    };
    println!("  Server: {url}");

    let api = OpencodeClient::new(url, config.server_auth());
    let directory = config.workspace_dir();
    let sessions = api
        .list_sessions(directory.as_deref(), Some(SESSION_LIMIT))
        .await?;
    let pending = api.list_permissions().await?;

    println!("  Pending approvals: {}", pending.len());
    println!("  Sessions: {}", sessions.len());
    let now = now_ms();
    for session in sort_sessions_for_picker(&sessions) {
        let title = session
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&session.id);
        println!(
            "    {}  {}  ({})",
            session.id,
            title,
            format_age(now - session.time.updated)
        );
    }
    println!();

    server.dispose();
    Ok(())
}
