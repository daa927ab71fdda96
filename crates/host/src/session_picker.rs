//! Session picker rows

use ocgui_protocol::editor::PickItem;
use ocgui_protocol::{SessionInfo, SessionSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPickItem {
    pub item: PickItem,
    pub session: SessionInfo,
}

/// Non-archived sessions, newest first.
pub fn sort_sessions_for_picker(sessions: &[SessionSummary]) -> Vec<&SessionSummary> {
    let mut visible: Vec<&SessionSummary> =
        sessions.iter().filter(|s| !s.is_archived()).collect();
    visible.sort_by(|a, b| b.time.updated.cmp(&a.time.updated));
    visible
}

/// `now_ms` is milliseconds since the epoch, like `time.updated`.
pub fn build_session_pick_items(sessions: &[SessionSummary], now_ms: i64) -> Vec<SessionPickItem> {
    sort_sessions_for_picker(sessions)
        .into_iter()
        .map(|session| {
            let label = session
                .title
                .as_deref()
                .map(str::trim)
                .filter(|title| !title.is_empty())
                .unwrap_or(&session.id);
            let detail = format!(
                "{} • {}",
                session.directory,
                format_age(now_ms - session.time.updated)
            );
            SessionPickItem {
                item: PickItem::new(label)
                    .description(session.id.clone())
                    .detail(detail),
                session: session.info(),
            }
        })
        .collect()
}

pub fn format_age(delta_ms: i64) -> String {
    if delta_ms < 0 {
        return "just now".to_string();
    }
    let sec = delta_ms / 1000;
    if sec < 60 {
        return "just now".to_string();
    }
    let min = sec / 60;
    if min < 60 {
        return format!("{min}m ago");
    }
    let hour = min / 60;
    if hour < 24 {
        return format!("{hour}h ago");
    }
    format!("{}d ago", hour / 24)
}
