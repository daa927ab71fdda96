//! Host logging
//!
//! stdout carries the editor bridge, so nothing is ever logged there.
//! Records go to `<data dir>/logs/host.log`; warnings can also be mirrored to
//! stderr, which the extension shows in its output channel.

use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Args, ValueEnum};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::paths;

/// Bridge frames and surface messages are logged at debug; keep them out
/// unless asked for.
const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn,ocgui::bridge=info,ocgui::router=info";
const LOG_FILE: &str = "host.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Args)]
pub struct LogOptions {
    /// Filter directives, e.g. `debug` or `ocgui::bridge=trace`
    #[arg(long = "log-filter", env = "OCGUI_LOG_FILTER", global = true)]
    pub filter: Option<String>,

    #[arg(
        long = "log-format",
        env = "OCGUI_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Json,
        global = true
    )]
    pub format: LogFormat,

    /// Mirror warnings and errors to stderr
    #[arg(long = "log-stderr", env = "OCGUI_LOG_STDERR", global = true)]
    pub stderr: bool,

    /// Start every run with an empty log file
    #[arg(long = "truncate-log", env = "OCGUI_TRUNCATE_LOG_ON_START", global = true)]
    pub truncate: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            filter: None,
            format: LogFormat::Json,
            stderr: false,
            truncate: false,
        }
    }
}

impl LogOptions {
    /// `--log-filter`, then `RUST_LOG`, then the host default. Invalid
    /// directives fall through to the next source.
    fn env_filter(&self) -> (EnvFilter, String) {
        let candidates = [self.filter.clone(), std::env::var("RUST_LOG").ok()];
        for directives in candidates.into_iter().flatten() {
            if let Ok(filter) = EnvFilter::try_new(&directives) {
                return (filter, directives);
            }
        }
        (EnvFilter::new(DEFAULT_FILTER), DEFAULT_FILTER.to_string())
    }
}

pub struct LoggingHandle {
    pub run_id: String,
    pub guard: WorkerGuard,
}

pub fn init_logging(options: &LogOptions) -> anyhow::Result<LoggingHandle> {
    let log_dir = paths::log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join(LOG_FILE);
    if options.truncate {
        std::fs::File::create(&log_path)?;
    }

    let (filter, directives) = options.env_filter();
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&log_dir, LOG_FILE));

    let file: Box<dyn Layer<Registry> + Send + Sync> = match options.format {
        LogFormat::Json => fmt::layer()
            .with_writer(writer)
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .pretty()
            .boxed(),
    };
    let stderr = options.stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .compact()
            .with_filter(LevelFilter::WARN)
    });

    tracing_subscriber::registry()
        .with(file.with_filter(filter))
        .with(stderr)
        .try_init()?;

    let started = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let run_id = format!("pid-{}-{}", std::process::id(), started);

    tracing::info!(
        component = "logging",
        event = "logging.initialized",
        run_id = %run_id,
        log_path = %log_path.display(),
        format = ?options.format,
        filter = %directives,
        stderr = options.stderr,
    );

    Ok(LoggingHandle { run_id, guard })
}
