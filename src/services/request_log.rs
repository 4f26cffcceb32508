use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Entries the file writer may fall behind by before appends are dropped.
pub const QUEUE_CAPACITY: usize = 1024;

/// How long shutdown waits for queued entries to reach the file.
pub const DEFAULT_FLUSH_GRACE: Duration = Duration::from_secs(5);

/// One handled weather request, as written to the request log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub city: String,
    pub status_code: u16,
    pub message: String,
}

impl LogEntry {
    pub fn new(city: impl Into<String>, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            city: city.into(),
            status_code,
            message: message.into(),
        }
    }
}

/// Renders `[<timestamp>] City: <city> | Status: <code> | Message: <message>`. Line breaks in
/// the city or message are escaped so each entry occupies exactly one line.
impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] City: {} | Status: {} | Message: {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            single_line(&self.city),
            self.status_code,
            single_line(&self.message),
        )
    }
}

fn single_line(text: &str) -> std::borrow::Cow<'_, str> {
    if text.contains(['\n', '\r']) {
        text.replace('\r', "\\r").replace('\n', "\\n").into()
    } else {
        text.into()
    }
}

/// Append-only sink for request outcomes. Appending never fails the caller; sink failures go to
/// the tracing channel.
pub trait RequestLog: fmt::Debug + Send + Sync {
    fn append(&self, entry: LogEntry);
}

pub type RequestLogRef = Arc<dyn RequestLog>;

/// Request log backed by a file, written by a single task fed through a channel.
#[derive(Debug, Clone)]
pub struct FileRequestLog {
    path: Arc<PathBuf>,
    tx: mpsc::Sender<LogEntry>,
}

impl FileRequestLog {
    /// Start the writer task. The file (and its parent directory) is created on the first
    /// append. The task finishes once every handle to the log has been dropped.
    pub fn spawn(path: impl Into<PathBuf>) -> (Self, RequestLogWriter) {
        Self::with_capacity(path, QUEUE_CAPACITY)
    }

    pub fn with_capacity(path: impl Into<PathBuf>, capacity: usize) -> (Self, RequestLogWriter) {
        let path = Arc::new(path.into());
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(drain_entries(path.clone(), rx));
        let writer = RequestLogWriter { path: path.clone(), handle };
        (Self { path, tx }, writer)
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }
}

impl RequestLog for FileRequestLog {
    fn append(&self, entry: LogEntry) {
        match self.tx.try_send(entry) {
            Ok(()) => {},
            Err(TrySendError::Full(entry)) => {
                error!(path=?self.path, %entry, "request log queue is full, dropping entry");
            },
            Err(TrySendError::Closed(entry)) => {
                error!(path=?self.path, %entry, "request log writer is gone, dropping entry");
            },
        }
    }
}

/// Handle on the task draining a [`FileRequestLog`] into its file.
#[derive(Debug)]
pub struct RequestLogWriter {
    path: Arc<PathBuf>,
    handle: JoinHandle<()>,
}

impl RequestLogWriter {
    /// Waits for queued entries to reach the file. The writer only completes after every
    /// `FileRequestLog` handle has been dropped, so call this once the server has stopped.
    /// Returns whether the queue drained within `grace`.
    #[instrument(level = "debug", skip(self), fields(path=?self.path))]
    pub async fn finish(self, grace: Duration) -> bool {
        match tokio::time::timeout(grace, self.handle).await {
            Ok(Ok(())) => {
                info!("request log flushed");
                true
            },
            Ok(Err(error)) => {
                error!(?error, "request log writer failed");
                false
            },
            Err(_elapsed) => {
                warn!(?grace, "request log writer did not finish in time; pending entries are lost");
                false
            },
        }
    }
}

#[instrument(level = "debug", skip(rx))]
async fn drain_entries(path: Arc<PathBuf>, mut rx: mpsc::Receiver<LogEntry>) {
    let mut file: Option<File> = None;

    while let Some(entry) = rx.recv().await {
        if file.is_none() {
            match open_log_file(&path).await {
                Ok(f) => {
                    info!(?path, "opened request log");
                    file = Some(f);
                },
                Err(error) => {
                    error!(?error, ?path, %entry, "failed to open request log");
                    continue;
                },
            }
        }

        if let Some(f) = file.as_mut() {
            let line = format!("{entry}\n");
            let written = async {
                f.write_all(line.as_bytes()).await?;
                f.flush().await
            };

            if let Err(error) = written.await {
                error!(?error, ?path, %entry, "failed to write to request log");
                // reopen on the next entry
                file = None;
            }
        }
    }

    debug!(?path, "request log writer finished");
}

async fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }

    OpenOptions::new().create(true).append(true).open(path).await
}

/// In-memory request log, for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct MemoryRequestLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryRequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl RequestLog for MemoryRequestLog {
    fn append(&self, entry: LogEntry) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).push(entry);
    }
}
