//! opencode server process supervision
//!
//! Spawns `opencode serve`, watches its combined stdout/stderr until a
//! [`ReadinessDetector`] reports the base URL, and tears the process down on
//! dispose. Concurrent `ensure_running` calls share one start attempt.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::StartError;

pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(20);

/// Output still arriving after the process exits is collected for this long.
const EXIT_DRAIN: Duration = Duration::from_millis(100);

/// Decides when the server is ready, from the output captured so far.
pub trait ReadinessDetector: Send + Sync {
    /// Returns the base URL once the accumulated `output` announces readiness.
    fn detect(&self, output: &str) -> Option<String>;
}

/// Matches the `opencode server listening on <url>` log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListenLineDetector;

impl ReadinessDetector for ListenLineDetector {
    fn detect(&self, output: &str) -> Option<String> {
        parse_server_url_from_output(output)
    }
}

fn listening_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)opencode server listening on\s+(https?://\S+)")
            .expect("listen line regex is valid")
    })
}

pub fn parse_server_url_from_output(output: &str) -> Option<String> {
    listening_re()
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// Called when the current process exits on its own, before or after readiness.
/// Not called for processes stopped by `dispose`.
pub type ExitHook = Arc<dyn Fn(ServerExit) + Send + Sync>;

#[derive(Clone)]
pub struct ServerOptions {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Added on top of the inherited environment
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
    pub detector: Arc<dyn ReadinessDetector>,
    pub on_exit: Option<ExitHook>,
}

impl ServerOptions {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            timeout: DEFAULT_START_TIMEOUT,
            detector: Arc::new(ListenLineDetector),
            on_exit: None,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn detector(mut self, detector: Arc<dyn ReadinessDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn on_exit(mut self, hook: ExitHook) -> Self {
        self.on_exit = Some(hook);
        self
    }
}

impl std::fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerOptions")
            .field("command", &self.command)
            .field("args", &self.args)
            .field("cwd", &self.cwd)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

type StartFuture = Shared<BoxFuture<'static, Result<String, StartError>>>;

/// Handle to a live child; dropping it kills the process.
struct Process {
    _kill: oneshot::Sender<()>,
}

#[derive(Default)]
struct Inner {
    url: Option<String>,
    process: Option<Process>,
    starting: Option<StartFuture>,
    /// Bumped on every start and dispose so stale tasks leave state alone.
    generation: u64,
}

pub struct ServerManager {
    options: ServerOptions,
    inner: Arc<Mutex<Inner>>,
}

impl ServerManager {
    pub fn new(options: ServerOptions) -> Self {
        Self {
            options,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Base URL of the running server, if it is ready.
    pub fn url(&self) -> Option<String> {
        self.inner.lock().unwrap().url.clone()
    }

    /// Start the server unless it is already running, and return its URL.
    pub async fn ensure_running(&self) -> Result<String, StartError> {
        let pending = {
            let mut inner = self.inner.lock().unwrap();
            if let (Some(url), Some(_)) = (&inner.url, &inner.process) {
                return Ok(url.clone());
            }
            match &inner.starting {
                Some(pending) => pending.clone(),
                None => {
                    inner.generation += 1;
                    let generation = inner.generation;
                    let command = self.options.command.clone();
                    let task = tokio::spawn(start(
                        self.options.clone(),
                        self.inner.clone(),
                        generation,
                    ));
                    let pending = async move {
                        task.await.unwrap_or_else(|e| {
                            Err(StartError::Spawn {
                                command,
                                message: e.to_string(),
                            })
                        })
                    }
                    .boxed()
                    .shared();
                    inner.starting = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    /// Kill the process if live and forget the URL. Safe to call repeatedly.
    pub fn dispose(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.generation += 1;
        inner.url = None;
        inner.starting = None;
        if inner.process.take().is_some() {
            info!(
                component = "server_manager",
                event = "opencode.dispose",
                "Stopping opencode server"
            );
        }
    }
}

impl Drop for ServerManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn start(
    options: ServerOptions,
    inner: Arc<Mutex<Inner>>,
    generation: u64,
) -> Result<String, StartError> {
    let result = launch(&options, &inner, generation).await;

    let mut guard = inner.lock().unwrap();
    if guard.generation == generation {
        guard.starting = None;
        match &result {
            // The process may already be gone; leave the URL unset then.
            Ok(url) if guard.process.is_some() => guard.url = Some(url.clone()),
            Ok(_) => {}
            Err(_) => {
                guard.url = None;
                guard.process = None;
            }
        }
    }
    result
}

async fn launch(
    options: &ServerOptions,
    inner: &Arc<Mutex<Inner>>,
    generation: u64,
) -> Result<String, StartError> {
    info!(
        component = "server_manager",
        event = "opencode.spawn",
        command = %options.command,
        args = ?options.args,
        cwd = ?options.cwd,
        "Spawning opencode server"
    );

    let mut command = Command::new(&options.command);
    command
        .args(&options.args)
        .envs(options.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &options.cwd {
        command.current_dir(cwd);
    }

    let mut child = command.spawn().map_err(|e| StartError::Spawn {
        command: options.command.clone(),
        message: e.to_string(),
    })?;

    let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<String>();
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(pump_output(stdout, chunk_tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(pump_output(stderr, chunk_tx));
    }

    let (kill_tx, kill_rx) = oneshot::channel();
    let (exit_tx, mut exit_rx) = oneshot::channel();
    {
        let mut guard = inner.lock().unwrap();
        // A dispose that raced the spawn drops `kill_tx` here, which kills the child.
        if guard.generation == generation {
            guard.process = Some(Process { _kill: kill_tx });
        }
    }
    tokio::spawn(supervise(
        child,
        kill_rx,
        exit_tx,
        inner.clone(),
        generation,
        options.on_exit.clone(),
    ));

    let deadline = tokio::time::sleep(options.timeout);
    tokio::pin!(deadline);
    let mut output = String::new();
    let mut output_open = true;

    loop {
        tokio::select! {
            biased;

            chunk = chunk_rx.recv(), if output_open => match chunk {
                Some(text) => {
                    output.push_str(&text);
                    if let Some(url) = options.detector.detect(&output) {
                        info!(
                            component = "server_manager",
                            event = "opencode.ready",
                            url = %url,
                            "opencode server ready"
                        );
                        return Ok(url);
                    }
                }
                None => output_open = false,
            },

            exit = &mut exit_rx => {
                let (code, signal) = exit.unwrap_or((None, None));
                let _ = tokio::time::timeout(EXIT_DRAIN, async {
                    while let Some(text) = chunk_rx.recv().await {
                        output.push_str(&text);
                    }
                })
                .await;
                warn!(
                    component = "server_manager",
                    event = "opencode.exit_before_ready",
                    code = ?code,
                    signal = ?signal,
                    "opencode server exited before ready"
                );
                return Err(StartError::ProcessExit { code, signal, output });
            }

            _ = &mut deadline => {
                warn!(
                    component = "server_manager",
                    event = "opencode.start_timeout",
                    timeout_ms = options.timeout.as_millis() as u64,
                    "Timed out waiting for opencode server"
                );
                return Err(StartError::Timeout {
                    timeout_ms: options.timeout.as_millis() as u64,
                    output,
                });
            }
        }
    }
}

/// Forward process output until EOF. Keeps draining after startup so the
/// child never blocks on a full pipe.
async fn pump_output<R>(mut reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                debug!(
                    component = "server_manager",
                    event = "opencode.output",
                    text = %text.trim_end(),
                    "opencode output"
                );
                let _ = tx.send(text);
            }
            Err(e) => {
                debug!(
                    component = "server_manager",
                    event = "opencode.output_error",
                    error = %e,
                    "Failed to read opencode output"
                );
                break;
            }
        }
    }
}

/// Wait for the child to exit, or kill it once its [`Process`] handle drops.
async fn supervise(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    exit_tx: oneshot::Sender<(Option<i32>, Option<i32>)>,
    inner: Arc<Mutex<Inner>>,
    generation: u64,
    on_exit: Option<ExitHook>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill_rx => {
            let _ = child.start_kill();
            child.wait().await
        }
    };

    let (code, signal) = match &status {
        Ok(status) => (status.code(), exit_signal(status)),
        Err(_) => (None, None),
    };
    info!(
        component = "server_manager",
        event = "opencode.exited",
        code = ?code,
        signal = ?signal,
        "opencode server exited"
    );

    let current = {
        let mut guard = inner.lock().unwrap();
        let current = guard.generation == generation;
        if current {
            guard.url = None;
            guard.process = None;
        }
        current
    };
    let _ = exit_tx.send((code, signal));
    if current {
        if let Some(hook) = on_exit {
            hook(ServerExit { code, signal });
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
