use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::{ReaderBuilder, WriterBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::{AppError, AppResult};

/// Commands accepted by a log writer task
enum LogCommand<R> {
    Append {
        row: R,
        ack: oneshot::Sender<AppResult<()>>,
    },
    Load {
        reply: oneshot::Sender<AppResult<Vec<R>>>,
    },
}

/// Append-only CSV file owned by a single writer task
///
/// Every request hands its row to the writer over a channel and waits for the
/// acknowledgement, so rows from concurrent requests are written one at a time
/// and never interleave. The header row is written only when the file is new
/// or empty, which keeps it unique across process restarts.
pub struct CsvLog<R> {
    path: Arc<PathBuf>,
    tx: mpsc::UnboundedSender<LogCommand<R>>,
    _row: PhantomData<fn() -> R>,
}

impl<R> Clone for CsvLog<R> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            tx: self.tx.clone(),
            _row: PhantomData,
        }
    }
}

impl<R> CsvLog<R>
where
    R: Serialize + DeserializeOwned + Send + 'static,
{
    /// Spawns the writer task for `path`. Must be called inside a Tokio runtime.
    ///
    /// The file itself is not touched until the first append.
    pub fn spawn(path: impl Into<PathBuf>) -> Self {
        let path = Arc::new(path.into());
        let (tx, rx) = mpsc::unbounded_channel();

        let task_path = path.clone();
        tokio::spawn(async move {
            Self::writer_task(task_path, rx).await;
        });

        Self {
            path,
            tx,
            _row: PhantomData,
        }
    }

    /// Appends one row and waits until it is on disk
    pub async fn append(&self, row: R) -> AppResult<()> {
        let (ack, ack_rx) = oneshot::channel();
        self.tx
            .send(LogCommand::Append { row, ack })
            .map_err(|_| self.writer_gone())?;
        ack_rx.await.map_err(|_| self.writer_gone())?
    }

    /// Reads every row back in file order. A missing file reads as empty.
    pub async fn load(&self) -> AppResult<Vec<R>> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(LogCommand::Load { reply })
            .map_err(|_| self.writer_gone())?;
        reply_rx.await.map_err(|_| self.writer_gone())?
    }

    fn writer_gone(&self) -> AppError {
        AppError::Internal(format!("log writer for {} has stopped", self.path.display()))
    }

    /// Background task owning the file
    ///
    /// Runs until every `CsvLog` handle is dropped. Blocking file I/O is moved
    /// to the blocking pool, one command at a time.
    async fn writer_task(path: Arc<PathBuf>, mut rx: mpsc::UnboundedReceiver<LogCommand<R>>) {
        tracing::debug!(path = %path.display(), "Log writer task started");

        while let Some(command) = rx.recv().await {
            match command {
                LogCommand::Append { row, ack } => {
                    let file = path.clone();
                    let result = tokio::task::spawn_blocking(move || append_row(&file, &row))
                        .await
                        .unwrap_or_else(|e| Err(AppError::Internal(e.to_string())));

                    if let Err(e) = &result {
                        tracing::error!(path = %path.display(), error = %e, "Failed to append log row");
                    }
                    let _ = ack.send(result);
                }
                LogCommand::Load { reply } => {
                    let file = path.clone();
                    let result = tokio::task::spawn_blocking(move || read_rows::<R>(&file))
                        .await
                        .unwrap_or_else(|e| Err(AppError::Internal(e.to_string())));
                    let _ = reply.send(result);
                }
            }
        }

        tracing::debug!(path = %path.display(), "Log writer task stopped");
    }
}

fn append_row<R: Serialize>(path: &Path, row: &R) -> AppResult<()> {
    let len = fs::metadata(path).map(|meta| meta.len()).unwrap_or(0);
    let needs_header = len == 0;

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    // A write cut short leaves a partial last line; start the new row on its own line
    if len > 0 && !ends_with_newline(path, len)? {
        tracing::warn!(path = %path.display(), "Log file ends mid-row, terminating it");
        file.write_all(b"\n")?;
    }
    let mut writer = WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

fn ends_with_newline(path: &Path, len: u64) -> io::Result<bool> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Reads all well-formed rows. Rows that do not parse are skipped with a warning.
fn read_rows<R: DeserializeOwned>(path: &Path) -> AppResult<Vec<R>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new().from_path(path)?;
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    line = e.position().map(|p| p.line()),
                    error = %e,
                    "Skipping malformed log row"
                );
            }
        }
    }
    Ok(rows)
}
