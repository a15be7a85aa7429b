//! Diagnostics setup and chat transcripts.
//!
//! When enabled, [`ChatLogger`] writes session events to daily log files
//! organized by channel or query. Log files are named `<target>_<date>.log`
//! and stored in the configured log directory (default:
//! `~/.local/share/ircbridge/logs/`).

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::irc::{MessageTarget, SessionEvent};

/// Install the global `tracing` subscriber on stderr. `RUST_LOG` wins over
/// `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Writes chat events to per-channel/query daily log files.
///
/// File handles are cached for the lifetime of the logger to avoid repeated
/// opens. A file that cannot be opened is reported once and skipped.
pub struct ChatLogger {
    enabled: bool,
    log_dir: PathBuf,
    log_channels: bool,
    log_queries: bool,
    file_handles: HashMap<String, Option<fs::File>>,
}

impl ChatLogger {
    pub fn new(config: &LoggingConfig) -> Self {
        Self {
            enabled: config.enabled,
            log_dir: expand_home(&config.log_dir),
            log_channels: config.log_channels,
            log_queries: config.log_queries,
            file_handles: HashMap::new(),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Write one event to the appropriate log file. No-op if logging is
    /// disabled or the event has no channel/query to file it under.
    pub fn log_event(&mut self, event: &SessionEvent) {
        if !self.enabled {
            return;
        }

        let (target, is_query, text) = match event {
            SessionEvent::PrivateMessage {
                from,
                target,
                message,
                kind,
            } => match kind {
                MessageTarget::Channel => (target, false, format!("<{}> {}", from, message)),
                MessageTarget::Query => (from, true, format!("<{}> {}", from, message)),
            },
            SessionEvent::Join { nick, channel } => {
                (channel, false, format!("*** {} has joined {}", nick, channel))
            }
            SessionEvent::Part {
                nick,
                channel,
                message,
            } => (channel, false, format!("*** {} has left ({})", nick, message)),
            SessionEvent::Topic {
                actor,
                channel,
                topic,
            } => {
                let text = match actor {
                    Some(actor) => format!("*** {} changed the topic to: {}", actor, topic),
                    None => format!("*** Topic is: {}", topic),
                };
                (channel, false, text)
            }
            _ => return,
        };

        if (is_query && !self.log_queries) || (!is_query && !self.log_channels) {
            return;
        }

        let now = chrono::Local::now();
        let line = format!("[{}] {}", now.format("%H:%M:%S"), text);

        // Sanitize target for filename
        let safe_target: String = target
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
            .collect();
        let filename = format!("{}_{}.log", safe_target, now.format("%Y-%m-%d"));

        let log_dir = &self.log_dir;
        let handle = self.file_handles.entry(filename.clone()).or_insert_with(|| {
            let filepath = log_dir.join(&filename);
            let opened = fs::create_dir_all(log_dir).and_then(|()| {
                OpenOptions::new().create(true).append(true).open(&filepath)
            });
            match opened {
                Ok(file) => Some(file),
                Err(e) => {
                    warn!(path = %filepath.display(), error = %e, "cannot open chat log");
                    None
                }
            }
        });

        if let Some(file) = handle {
            if let Err(e) = writeln!(file, "{}", line) {
                warn!(%filename, error = %e, "chat log write failed");
            }
        }
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_home(dir: &str) -> PathBuf {
    match dir.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(dir)),
        None => PathBuf::from(dir),
    }
}
