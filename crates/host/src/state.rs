//! Host state
//!
//! Active session, runtime state and connection status. Owned by the host
//! app and changed only through the setters below.

use ocgui_protocol::{SessionInfo, SessionRuntimeState};
use tracing::{debug, warn};

use crate::status_bar::{build_status_bar_state, StatusBarState, StatusInput};
use crate::workspace_state::WorkspaceState;

pub const ACTIVE_SESSION_KEY: &str = "opencodeGui.activeSession";

pub struct HostState {
    active_session: Option<SessionInfo>,
    runtime_state: SessionRuntimeState,
    pending_permissions: usize,
    server_url: Option<String>,
    store: WorkspaceState,
}

impl HostState {
    /// Restore the persisted active session, ignoring incomplete entries.
    pub fn restore(store: WorkspaceState) -> Self {
        let active_session = store
            .get::<SessionInfo>(ACTIVE_SESSION_KEY)
            .filter(|s| !s.id.is_empty() && !s.directory.is_empty());
        Self {
            active_session,
            runtime_state: SessionRuntimeState::Idle,
            pending_permissions: 0,
            server_url: None,
            store,
        }
    }

    pub fn active_session(&self) -> Option<&SessionInfo> {
        self.active_session.as_ref()
    }

    pub fn set_active_session(&mut self, session: Option<SessionInfo>) {
        if self.active_session == session {
            return;
        }
        debug!(
            component = "host_state",
            event = "host_state.active_session",
            session_id = ?session.as_ref().map(|s| s.id.as_str()),
            "Active session changed"
        );
        if let Err(e) = self.store.update(ACTIVE_SESSION_KEY, session.as_ref()) {
            warn!(
                component = "host_state",
                event = "host_state.persist_failed",
                error = %e,
                "Failed to persist active session"
            );
        }
        self.active_session = session;
    }

    pub fn runtime_state(&self) -> SessionRuntimeState {
        self.runtime_state
    }

    pub fn set_runtime_state(&mut self, state: SessionRuntimeState) {
        self.runtime_state = state;
    }

    pub fn pending_permissions(&self) -> usize {
        self.pending_permissions
    }

    pub fn set_pending_permissions(&mut self, count: usize) {
        self.pending_permissions = count;
    }

    pub fn server_url(&self) -> Option<&str> {
        self.server_url.as_deref()
    }

    pub fn set_server_url(&mut self, url: Option<String>) {
        self.server_url = url;
    }

    pub fn status(&self) -> StatusBarState {
        build_status_bar_state(&StatusInput {
            connected: self.server_url.is_some(),
            server_url: self.server_url.as_deref(),
            session_state: self.runtime_state,
            pending_permissions: self.pending_permissions,
        })
    }
}
