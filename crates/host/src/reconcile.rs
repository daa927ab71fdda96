//! Pure server event reconciliation
//!
//! Maps one pushed event plus the current active session to a decision:
//! `decide_server_event(event, active) -> ServerEventDecision`.
//! No IO, no async. The host applies the decision in arrival order.

use ocgui_protocol::{GlobalEventEnvelope, SessionInfo, SessionRuntimeState};
use serde_json::Value;

// ---------------------------------------------------------------------------
// ServerEventDecision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerEventDecision {
    /// Pending permissions changed; re-list them.
    pub refresh_permissions: bool,
    /// Session the host should adopt as active.
    pub next_session: Option<SessionInfo>,
    pub next_state: Option<SessionRuntimeState>,
}

impl ServerEventDecision {
    fn none() -> Self {
        Self::default()
    }

    fn state(state: SessionRuntimeState, session: Option<SessionInfo>) -> Self {
        Self {
            refresh_permissions: false,
            next_session: session,
            next_state: Some(state),
        }
    }

    pub fn is_noop(&self) -> bool {
        !self.refresh_permissions && self.next_session.is_none() && self.next_state.is_none()
    }
}

// ---------------------------------------------------------------------------
// decide_server_event
// ---------------------------------------------------------------------------

pub fn decide_server_event(
    event: &GlobalEventEnvelope,
    active: Option<&SessionInfo>,
) -> ServerEventDecision {
    let Some(event_type) = event.event_type() else {
        return ServerEventDecision::none();
    };

    match event_type {
        "permission.asked" | "permission.replied" | "permission.updated" => ServerEventDecision {
            refresh_permissions: true,
            ..Default::default()
        },

        "session.created" | "session.updated" => {
            if active.is_some() {
                return ServerEventDecision::none();
            }
            ServerEventDecision {
                next_session: read_info(event.property("info")),
                ..Default::default()
            }
        }

        "session.status" => {
            let (Some(session_id), Some(status)) = (
                read_session_id(event),
                read_status_type(event.property("status")),
            ) else {
                return ServerEventDecision::none();
            };

            match active {
                Some(current) if current.id != session_id => {
                    // Another session needs attention; only activity hands it off.
                    if !matches!(
                        status,
                        SessionRuntimeState::Busy | SessionRuntimeState::Retry
                    ) {
                        return ServerEventDecision::none();
                    }
                    let session =
                        read_directory(event).map(|dir| SessionInfo::new(session_id, dir));
                    ServerEventDecision::state(status, session)
                }
                Some(_) => ServerEventDecision::state(status, None),
                None => ServerEventDecision::state(status, adopt(session_id, event)),
            }
        }

        "session.idle" => {
            let Some(session_id) = read_session_id(event) else {
                return ServerEventDecision::none();
            };
            match active {
                Some(current) if current.id != session_id => ServerEventDecision::none(),
                Some(_) => ServerEventDecision::state(SessionRuntimeState::Idle, None),
                None => {
                    ServerEventDecision::state(SessionRuntimeState::Idle, adopt(session_id, event))
                }
            }
        }

        "session.error" => {
            let session_id = read_session_id(event);
            match (active, session_id) {
                (Some(current), Some(id)) if current.id != id => ServerEventDecision::none(),
                (Some(_), _) => ServerEventDecision::state(SessionRuntimeState::Error, None),
                (None, id) => ServerEventDecision::state(
                    SessionRuntimeState::Error,
                    id.and_then(|id| adopt(id, event)),
                ),
            }
        }

        _ => ServerEventDecision::none(),
    }
}

fn adopt(session_id: &str, event: &GlobalEventEnvelope) -> Option<SessionInfo> {
    read_directory(event).map(|dir| SessionInfo::new(session_id, dir))
}

fn read_session_id(event: &GlobalEventEnvelope) -> Option<&str> {
    event
        .property("sessionID")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// The envelope directory; `"global"` and empty never resolve.
fn read_directory(event: &GlobalEventEnvelope) -> Option<&str> {
    event.scoped_directory().filter(|dir| !dir.is_empty())
}

fn read_status_type(value: Option<&Value>) -> Option<SessionRuntimeState> {
    match value?.get("type")?.as_str()? {
        "idle" => Some(SessionRuntimeState::Idle),
        "busy" => Some(SessionRuntimeState::Busy),
        "retry" => Some(SessionRuntimeState::Retry),
        _ => None,
    }
}

fn read_info(info: Option<&Value>) -> Option<SessionInfo> {
    let info = info?;
    let id = info.get("id")?.as_str().filter(|id| !id.is_empty())?;
    let directory = info.get("directory")?.as_str().filter(|dir| !dir.is_empty())?;
    Some(SessionInfo::new(id, directory))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: Value) -> GlobalEventEnvelope {
        serde_json::from_value(value).expect("valid envelope")
    }

    fn session(id: &str, dir: &str) -> SessionInfo {
        SessionInfo::new(id, dir)
    }

    #[test]
    fn permission_events_refresh_regardless_of_active_session() {
        for kind in ["permission.asked", "permission.replied", "permission.updated"] {
            let e = event(json!({ "payload": { "type": kind, "properties": {} } }));
            let active = session("cur", "/w");
            assert!(decide_server_event(&e, None).refresh_permissions);
            let decision = decide_server_event(&e, Some(&active));
            assert!(decision.refresh_permissions);
            assert_eq!(decision.next_session, None);
            assert_eq!(decision.next_state, None);
        }
    }

    #[test]
    fn session_created_adopted_only_without_active_session() {
        let e = event(json!({
            "directory": "/w",
            "payload": {
                "type": "session.created",
                "properties": { "info": { "id": "s1", "directory": "/w", "title": "x" } }
            }
        }));
        assert_eq!(
            decide_server_event(&e, None).next_session,
            Some(session("s1", "/w"))
        );
        assert!(decide_server_event(&e, Some(&session("cur", "/w"))).is_noop());
    }

    #[test]
    fn session_updated_without_directory_is_noop() {
        let e = event(json!({
            "payload": { "type": "session.updated", "properties": { "info": { "id": "s1" } } }
        }));
        assert!(decide_server_event(&e, None).is_noop());
    }

    #[test]
    fn busy_background_session_takes_over() {
        let e = event(json!({
            "directory": "D",
            "payload": {
                "type": "session.status",
                "properties": { "sessionID": "new", "status": { "type": "busy" } }
            }
        }));
        let decision = decide_server_event(&e, Some(&session("old", "D")));
        assert_eq!(decision.next_session, Some(session("new", "D")));
        assert_eq!(decision.next_state, Some(SessionRuntimeState::Busy));
        assert!(!decision.refresh_permissions);
    }

    #[test]
    fn retry_on_global_directory_is_state_only() {
        let e = event(json!({
            "directory": "global",
            "payload": {
                "type": "session.status",
                "properties": { "sessionID": "new", "status": { "type": "retry" } }
            }
        }));
        let decision = decide_server_event(&e, Some(&session("old", "D")));
        assert_eq!(decision.next_session, None);
        assert_eq!(decision.next_state, Some(SessionRuntimeState::Retry));
    }

    #[test]
    fn idle_status_for_other_session_is_ignored() {
        let e = event(json!({
            "directory": "D",
            "payload": {
                "type": "session.status",
                "properties": { "sessionID": "new", "status": { "type": "idle" } }
            }
        }));
        assert!(decide_server_event(&e, Some(&session("old", "D"))).is_noop());
    }

    #[test]
    fn status_requires_known_kind_and_session_id() {
        let unknown = event(json!({
            "payload": {
                "type": "session.status",
                "properties": { "sessionID": "s1", "status": { "type": "sleeping" } }
            }
        }));
        assert!(decide_server_event(&unknown, None).is_noop());

        let missing = event(json!({
            "payload": { "type": "session.status", "properties": { "status": { "type": "busy" } } }
        }));
        assert!(decide_server_event(&missing, None).is_noop());
    }

    #[test]
    fn status_for_active_session_propagates_without_handoff() {
        let e = event(json!({
            "directory": "D",
            "payload": {
                "type": "session.status",
                "properties": { "sessionID": "cur", "status": { "type": "idle" } }
            }
        }));
        let decision = decide_server_event(&e, Some(&session("cur", "D")));
        assert_eq!(decision.next_session, None);
        assert_eq!(decision.next_state, Some(SessionRuntimeState::Idle));
    }

    #[test]
    fn status_without_active_session_adopts_when_directory_known() {
        let e = event(json!({
            "directory": "D",
            "payload": {
                "type": "session.status",
                "properties": { "sessionID": "s1", "status": { "type": "busy" } }
            }
        }));
        let decision = decide_server_event(&e, None);
        assert_eq!(decision.next_session, Some(session("s1", "D")));
        assert_eq!(decision.next_state, Some(SessionRuntimeState::Busy));
    }

    #[test]
    fn idle_for_other_session_yields_no_change() {
        let e = event(json!({
            "directory": "D",
            "payload": { "type": "session.idle", "properties": { "sessionID": "other" } }
        }));
        assert!(decide_server_event(&e, Some(&session("cur", "D"))).is_noop());
    }

    #[test]
    fn idle_without_active_session_on_global_scope_sets_state_only() {
        let e = event(json!({
            "directory": "global",
            "payload": { "type": "session.idle", "properties": { "sessionID": "s1" } }
        }));
        let decision = decide_server_event(&e, None);
        assert_eq!(decision.next_session, None);
        assert_eq!(decision.next_state, Some(SessionRuntimeState::Idle));
    }

    #[test]
    fn error_without_session_id_applies_to_active_session() {
        let e = event(json!({
            "directory": "D",
            "payload": { "type": "session.error", "properties": {} }
        }));
        let decision = decide_server_event(&e, Some(&session("cur", "D")));
        assert_eq!(decision.next_state, Some(SessionRuntimeState::Error));
        assert_eq!(decision.next_session, None);

        let decision = decide_server_event(&e, None);
        assert_eq!(decision.next_state, Some(SessionRuntimeState::Error));
        assert_eq!(decision.next_session, None);
    }

    #[test]
    fn error_for_other_session_is_ignored() {
        let e = event(json!({
            "directory": "D",
            "payload": { "type": "session.error", "properties": { "sessionID": "other" } }
        }));
        assert!(decide_server_event(&e, Some(&session("cur", "D"))).is_noop());

        let adopted = decide_server_event(&e, None);
        assert_eq!(adopted.next_session, Some(session("other", "D")));
    }

    #[test]
    fn unknown_or_untyped_events_are_noops() {
        for value in [
            json!({}),
            json!({ "payload": {} }),
            json!({ "payload": { "type": "message.updated", "properties": {} } }),
        ] {
            assert!(decide_server_event(&event(value), None).is_noop());
        }
    }

    #[test]
    fn empty_session_ids_never_become_active() {
        let active = session("cur", "D");
        let status = event(json!({
            "directory": "D",
            "payload": { "type": "session.status", "properties": {
                "sessionID": "", "status": { "type": "busy" }
            } }
        }));
        assert!(decide_server_event(&status, Some(&active)).is_noop());
        assert!(decide_server_event(&status, None).is_noop());

        let idle = event(json!({
            "directory": "D",
            "payload": { "type": "session.idle", "properties": { "sessionID": "" } }
        }));
        assert!(decide_server_event(&idle, None).is_noop());
        assert!(decide_server_event(&idle, Some(&active)).is_noop());

        let error = event(json!({
            "directory": "D",
            "payload": { "type": "session.error", "properties": { "sessionID": "" } }
        }));
        let decision = decide_server_event(&error, None);
        assert_eq!(decision.next_session, None);
        assert_eq!(decision.next_state, Some(SessionRuntimeState::Error));

        let created = event(json!({
            "directory": "D",
            "payload": { "type": "session.created", "properties": {
                "info": { "id": "", "directory": "D" }
            } }
        }));
        assert!(decide_server_event(&created, None).is_noop());
    }
}
