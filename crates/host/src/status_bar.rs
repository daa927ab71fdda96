use ocgui_protocol::SessionRuntimeState;

/// Inputs for the status bar item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusInput<'a> {
    pub connected: bool,
    pub server_url: Option<&'a str>,
    pub session_state: SessionRuntimeState,
    pub pending_permissions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBarState {
    pub text: String,
    pub tooltip: String,
}

pub fn build_status_bar_state(input: &StatusInput<'_>) -> StatusBarState {
    let mut parts = vec!["$(globe) OpenCode GUI".to_string()];
    if input.connected {
        parts.push("Connected".to_string());
    }

    match input.session_state {
        SessionRuntimeState::Busy => parts.push("$(sync~spin)".to_string()),
        SessionRuntimeState::Retry => parts.push("$(history)".to_string()),
        SessionRuntimeState::Error => parts.push("$(error)".to_string()),
        SessionRuntimeState::Idle => {}
    }

    if input.pending_permissions > 0 {
        parts.push(format!("$(warning){}", input.pending_permissions));
    }

    let server = match input.server_url {
        Some(url) => format!("Server: {url}"),
        None => "Server: disconnected".to_string(),
    };
    let tooltip = [
        server,
        format!("Session: {}", input.session_state.as_str()),
        format!("Pending approvals: {}", input.pending_permissions),
    ]
    .join("\n");

    StatusBarState {
        text: parts.join(" "),
        tooltip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnected_idle_status() {
        let state = build_status_bar_state(&StatusInput::default());
        assert_eq!(state.text, "$(globe) OpenCode GUI");
        assert_eq!(
            state.tooltip,
            "Server: disconnected\nSession: idle\nPending approvals: 0"
        );
    }

    #[test]
    fn busy_with_pending_approvals() {
        let state = build_status_bar_state(&StatusInput {
            connected: true,
            server_url: Some("http://127.0.0.1:4096"),
            session_state: SessionRuntimeState::Busy,
            pending_permissions: 2,
        });
        assert_eq!(
            state.text,
            "$(globe) OpenCode GUI Connected $(sync~spin) $(warning)2"
        );
        assert!(state.tooltip.starts_with("Server: http://127.0.0.1:4096\n"));
        assert!(state.tooltip.ends_with("Pending approvals: 2"));
    }

    #[test]
    fn error_and_retry_icons() {
        let error = build_status_bar_state(&StatusInput {
            session_state: SessionRuntimeState::Error,
            ..Default::default()
        });
        assert_eq!(error.text, "$(globe) OpenCode GUI $(error)");

        let retry = build_status_bar_state(&StatusInput {
            session_state: SessionRuntimeState::Retry,
            ..Default::default()
        });
        assert_eq!(retry.text, "$(globe) OpenCode GUI $(history)");
    }
}
