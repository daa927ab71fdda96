//! Event stream client
//!
//! Follows `GET /event` and forwards each `data:` line as a
//! [`GlobalEventEnvelope`]. A dropped connection is logged and retried after a
//! fixed delay until the client is stopped.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use ocgui_protocol::{GlobalEventEnvelope, ServerAuth};
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::auth_header;
use crate::ClientError;

pub const RECONNECT_DELAY: Duration = Duration::from_millis(1200);

/// Receives every decoded envelope, in stream order.
pub type EventSink = Arc<dyn Fn(GlobalEventEnvelope) + Send + Sync>;

/// Decode one line of the event stream.
///
/// Lines without the `data:` prefix, blank payloads and non-object payloads
/// yield `Ok(None)`. Malformed JSON is an error for the caller to log.
pub fn parse_sse_data_line(line: &str) -> Result<Option<GlobalEventEnvelope>, serde_json::Error> {
    let Some(raw) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Ok(None);
    }
    serde_json::from_value(value).map(Some)
}

struct Running {
    server_url: String,
    auth_key: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct EventStreamClient {
    http: reqwest::Client,
    sink: EventSink,
    reconnect_delay: Duration,
    running: Mutex<Option<Running>>,
}

impl EventStreamClient {
    pub fn new(sink: EventSink) -> Self {
        Self::with_http(reqwest::Client::new(), sink)
    }

    pub fn with_http(http: reqwest::Client, sink: EventSink) -> Self {
        Self {
            http,
            sink,
            reconnect_delay: RECONNECT_DELAY,
            running: Mutex::new(None),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Follow the stream of `server_url`.
    ///
    /// A no-op while already following the same URL with the same
    /// credentials. Any other running stream is torn down first.
    pub fn start(&self, server_url: &str, auth: Option<&ServerAuth>) {
        let auth_key = ServerAuth::key(auth);
        let mut running = self.running.lock().unwrap();

        if let Some(current) = running.as_ref() {
            if current.server_url == server_url
                && current.auth_key == auth_key
                && !current.task.is_finished()
            {
                return;
            }
        }
        if let Some(previous) = running.take() {
            previous.cancel.cancel();
        }

        info!(
            component = "event_stream",
            event = "event_stream.start",
            server_url = %server_url,
            "Following server event stream"
        );

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            self.http.clone(),
            server_url.to_string(),
            auth.cloned(),
            self.sink.clone(),
            cancel.clone(),
            self.reconnect_delay,
        ));
        *running = Some(Running {
            server_url: server_url.to_string(),
            auth_key,
            cancel,
            task,
        });
    }

    /// Abort the in-flight request and stop reconnecting. Idempotent.
    pub fn stop(&self) {
        if let Some(previous) = self.running.lock().unwrap().take() {
            previous.cancel.cancel();
            debug!(
                component = "event_stream",
                event = "event_stream.stop",
                server_url = %previous.server_url,
                "Stopped server event stream"
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }
}

impl Drop for EventStreamClient {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop(
    http: reqwest::Client,
    server_url: String,
    auth: Option<ServerAuth>,
    sink: EventSink,
    cancel: CancellationToken,
    reconnect_delay: Duration,
) {
    let url = format!("{}/event", server_url.trim_end_matches('/'));

    loop {
        let result = tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            result = consume(&http, &url, auth.as_ref(), &sink) => result,
        };

        if cancel.is_cancelled() {
            break;
        }

        match result {
            Ok(()) => info!(
                component = "event_stream",
                event = "event_stream.closed",
                url = %url,
                "Event stream closed by server"
            ),
            Err(error) => warn!(
                component = "event_stream",
                event = "event_stream.disconnected",
                url = %url,
                error = %error,
                "Event stream disconnected"
            ),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }
}

async fn consume(
    http: &reqwest::Client,
    url: &str,
    auth: Option<&ServerAuth>,
    sink: &EventSink,
) -> Result<(), ClientError> {
    let mut request = http.get(url);
    if let Some(value) = auth_header(auth) {
        request = request.header(AUTHORIZATION, value);
    }
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Status {
            status: status.as_u16(),
        });
    }

    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);

        while let Some(index) = buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = buffer.drain(..=index).collect();
            let decoded = String::from_utf8_lossy(&raw[..index]);
            let line = decoded.strip_suffix('\r').unwrap_or(&decoded);

            match parse_sse_data_line(line) {
                Ok(Some(envelope)) => sink(envelope),
                Ok(None) => {}
                Err(error) => warn!(
                    component = "event_stream",
                    event = "event_stream.parse_error",
                    error = %error,
                    line_preview = %line.chars().take(200).collect::<String>(),
                    "Failed to parse event line"
                ),
            }
        }
    }

    Ok(())
}
