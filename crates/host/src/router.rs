//! Surface message routing
//!
//! Decodes untrusted messages posted by an embedded surface and calls the
//! matching handler. Anything that does not decode is dropped.

use async_trait::async_trait;
use ocgui_protocol::{ClientMessage, Surface};
use serde_json::Value;
use tracing::debug;

/// One handler per surface message.
#[async_trait]
pub trait WebviewHandlers: Send {
    async fn on_ready(&mut self, surface: Surface, url: String);
    async fn on_new_session(&mut self);
    async fn on_session_menu(&mut self);
    async fn on_review_permissions(&mut self);
    async fn on_attach_menu(&mut self);
    async fn on_send_context(&mut self);
    async fn on_prompt(&mut self, text: String);
    async fn on_switch_session(&mut self);
    async fn on_open_panel(&mut self);
    async fn on_show_todo(&mut self);
    async fn on_show_diff(&mut self);
    async fn on_run_command(&mut self);
    async fn on_run_shell(&mut self);
    async fn on_abort_session(&mut self);
    async fn on_open_reference(&mut self);
    async fn on_refresh(&mut self);
    async fn on_frame_error(&mut self);
}

/// Route `message` from `surface`; false when it was dropped.
pub async fn dispatch_webview_message<H>(surface: Surface, message: &Value, handlers: &mut H) -> bool
where
    H: WebviewHandlers + ?Sized,
{
    let Some(msg) = ClientMessage::from_value(message) else {
        debug!(
            component = "router",
            event = "router.message.dropped",
            surface = ?surface,
            "Dropped malformed surface message"
        );
        return false;
    };

    debug!(
        component = "router",
        event = "router.message.received",
        surface = ?surface,
        message = ?msg,
        "Received surface message"
    );

    match msg {
        ClientMessage::Ready { url } => handlers.on_ready(surface, url).await,
        ClientMessage::NewSession => handlers.on_new_session().await,
        ClientMessage::SessionMenu => handlers.on_session_menu().await,
        ClientMessage::ReviewPermissions => handlers.on_review_permissions().await,
        ClientMessage::AttachMenu => handlers.on_attach_menu().await,
        ClientMessage::SendContext => handlers.on_send_context().await,
        ClientMessage::Prompt { text } => handlers.on_prompt(text).await,
        ClientMessage::SwitchSession => handlers.on_switch_session().await,
        ClientMessage::OpenPanel => handlers.on_open_panel().await,
        ClientMessage::ShowTodo => handlers.on_show_todo().await,
        ClientMessage::ShowDiff => handlers.on_show_diff().await,
        ClientMessage::RunCommand => handlers.on_run_command().await,
        ClientMessage::RunShell => handlers.on_run_shell().await,
        ClientMessage::AbortSession => handlers.on_abort_session().await,
        ClientMessage::OpenReference => handlers.on_open_reference().await,
        ClientMessage::Refresh => handlers.on_refresh().await,
        ClientMessage::FrameError => handlers.on_frame_error().await,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl Recorder {
        fn hit(&mut self, name: &str) {
            self.calls.push(name.to_string());
        }
    }

    #[async_trait]
    impl WebviewHandlers for Recorder {
        async fn on_ready(&mut self, _surface: Surface, url: String) {
            self.hit(&format!("ready:{url}"));
        }
        async fn on_new_session(&mut self) {
            self.hit("new-session");
        }
        async fn on_session_menu(&mut self) {
            self.hit("session-menu");
        }
        async fn on_review_permissions(&mut self) {
            self.hit("review-permissions");
        }
        async fn on_attach_menu(&mut self) {
            self.hit("attach-menu");
        }
        async fn on_send_context(&mut self) {
            self.hit("send-context");
        }
        async fn on_prompt(&mut self, text: String) {
            self.hit(&format!("prompt:{text}"));
        }
        async fn on_switch_session(&mut self) {
            self.hit("switch-session");
        }
        async fn on_open_panel(&mut self) {
            self.hit("open-panel");
        }
        async fn on_show_todo(&mut self) {
            self.hit("show-todo");
        }
        async fn on_show_diff(&mut self) {
            self.hit("show-diff");
        }
        async fn on_run_command(&mut self) {
            self.hit("run-command");
        }
        async fn on_run_shell(&mut self) {
            self.hit("run-shell");
        }
        async fn on_abort_session(&mut self) {
            self.hit("abort-session");
        }
        async fn on_open_reference(&mut self) {
            self.hit("open-reference");
        }
        async fn on_refresh(&mut self) {
            self.hit("refresh");
        }
        async fn on_frame_error(&mut self) {
            self.hit("frame-error");
        }
    }

    async fn route(message: Value) -> Vec<String> {
        let mut recorder = Recorder::default();
        dispatch_webview_message(Surface::Sidebar, &message, &mut recorder).await;
        recorder.calls
    }

    #[tokio::test]
    async fn routes_every_action_type() {
        let cases = [
            ("action-new-session", "new-session"),
            ("action-session-menu", "session-menu"),
            ("action-review-permissions", "review-permissions"),
            ("action-attach-menu", "attach-menu"),
            ("action-send-context", "send-context"),
            ("action-switch-session", "switch-session"),
            ("action-open-panel", "open-panel"),
            ("action-show-todo", "show-todo"),
            ("action-show-diff", "show-diff"),
            ("action-run-command", "run-command"),
            ("action-run-shell", "run-shell"),
            ("action-abort-session", "abort-session"),
            ("action-open-reference", "open-reference"),
            ("action-refresh", "refresh"),
            ("frame-error", "frame-error"),
        ];
        for (kind, handler) in cases {
            assert_eq!(route(json!({ "type": kind })).await, [handler], "{kind}");
        }
    }

    #[tokio::test]
    async fn ready_coerces_url_to_string() {
        assert_eq!(
            route(json!({ "type": "ready", "url": "http://h/%2Fw/session/s1" })).await,
            ["ready:http://h/%2Fw/session/s1"]
        );
        assert_eq!(route(json!({ "type": "ready", "url": 42 })).await, ["ready:42"]);
        assert_eq!(route(json!({ "type": "ready" })).await, ["ready:"]);
    }

    #[tokio::test]
    async fn prompt_text_is_trimmed_and_blank_prompts_dropped() {
        assert_eq!(
            route(json!({ "type": "action-prompt", "text": "  fix it \n" })).await,
            ["prompt:fix it"]
        );
        assert!(route(json!({ "type": "action-prompt", "text": "  " })).await.is_empty());
        assert!(route(json!({ "type": "action-prompt" })).await.is_empty());
    }

    #[tokio::test]
    async fn malformed_messages_call_nothing() {
        for message in [json!(null), json!([1]), json!({ "type": 1 }), json!({ "type": "nope" })] {
            let mut recorder = Recorder::default();
            let routed = dispatch_webview_message(Surface::Panel, &message, &mut recorder).await;
            assert!(!routed);
            assert!(recorder.calls.is_empty());
        }
    }
}
