/*
[INPUT]:  Test-driven state changes (running, removed, attach failures) and emitted bytes
[OUTPUT]: Scripted RuntimeClient with attach/inspect/release counters
[POS]:    Test support - deterministic runtime for pipeline tests
[UPDATE]: When the RuntimeClient contract changes
*/

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::sync::Mutex as TokioMutex;
use tokio_util::sync::CancellationToken;

use crate::client::{LogOptions, LogStream, RuntimeClient};
use crate::error::{Result, RuntimeError};
use crate::frame::{StreamKind, encode_frame};

const MOCK_PIPE_BYTES: usize = 64 * 1024;

#[derive(Debug)]
struct MockState {
    running: bool,
    removed: bool,
    tty: bool,
    attach_error: Option<String>,
    history: Vec<u8>,
    opens: usize,
    inspections: usize,
    last_options: Option<LogOptions>,
}

/// Scripted runtime for tests.
///
/// Every attach gets a fresh in-memory pipe; bytes passed to [`emit`](Self::emit)
/// go to the most recent one.
#[derive(Debug)]
pub struct MockRuntime {
    state: StdMutex<MockState>,
    attached: TokioMutex<Option<DuplexStream>>,
    released: Arc<AtomicUsize>,
}

impl MockRuntime {
    /// Running source with a raw (tty) stream
    pub fn new() -> Self {
        Self::with_tty(true)
    }

    /// Running source with a multiplexed stream
    pub fn multiplexed() -> Self {
        Self::with_tty(false)
    }

    fn with_tty(tty: bool) -> Self {
        Self {
            state: StdMutex::new(MockState {
                running: true,
                removed: false,
                tty,
                attach_error: None,
                history: Vec::new(),
                opens: 0,
                inspections: 0,
                last_options: None,
            }),
            attached: TokioMutex::new(None),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bytes written at the start of every new attachment
    pub fn with_history(self, history: &[u8]) -> Self {
        self.state().history = history.to_vec();
        self
    }

    pub fn set_running(&self, running: bool) {
        self.state().running = running;
    }

    /// Mark the source stopped and end the attached stream.
    pub async fn stop(&self) {
        self.set_running(false);
        self.close_stream().await;
    }

    /// Mark the source removed and end the attached stream.
    pub async fn remove(&self) {
        self.state().removed = true;
        self.close_stream().await;
    }

    /// Make subsequent attaches fail with `PermissionDenied`.
    pub fn fail_attach(&self, message: impl Into<String>) {
        self.state().attach_error = Some(message.into());
    }

    /// End the attached stream without changing the running flag.
    pub async fn close_stream(&self) {
        self.attached.lock().await.take();
    }

    /// Write raw bytes into the attached stream. Returns `false` when nothing is attached.
    pub async fn emit(&self, bytes: &[u8]) -> bool {
        let mut attached = self.attached.lock().await;
        let Some(writer) = attached.as_mut() else {
            return false;
        };
        if writer.write_all(bytes).await.is_err() {
            attached.take();
            return false;
        }
        true
    }

    /// Write one multiplexed frame into the attached stream.
    pub async fn emit_frame(&self, kind: StreamKind, payload: &[u8]) -> bool {
        self.emit(&encode_frame(kind, payload)).await
    }

    pub async fn is_attached(&self) -> bool {
        self.attached.lock().await.is_some()
    }

    pub fn open_count(&self) -> usize {
        self.state().opens
    }

    pub fn inspect_count(&self) -> usize {
        self.state().inspections
    }

    /// Number of handed-out readers that have been dropped
    pub fn released_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<LogOptions> {
        self.state().last_options.clone()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuntimeClient for MockRuntime {
    async fn open_log_stream(
        &self,
        source: &str,
        options: &LogOptions,
        cancel: &CancellationToken,
    ) -> Result<LogStream> {
        if cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }
        let (tty, history) = {
            let mut state = self.state();
            if state.removed {
                return Err(RuntimeError::NotFound(source.to_string()));
            }
            if let Some(message) = state.attach_error.clone() {
                return Err(RuntimeError::PermissionDenied {
                    source_id: source.to_string(),
                    message,
                });
            }
            state.opens += 1;
            state.last_options = Some(options.clone());
            (state.tty, state.history.clone())
        };

        let (reader, mut writer) = tokio::io::duplex(MOCK_PIPE_BYTES);
        if !history.is_empty() {
            writer.write_all(&history).await?;
        }
        *self.attached.lock().await = Some(writer);

        Ok(LogStream {
            reader: Box::new(TrackedReader {
                inner: reader,
                released: self.released.clone(),
            }),
            tty,
        })
    }

    async fn inspect_running(&self, source: &str, cancel: &CancellationToken) -> Result<bool> {
        if cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }
        let mut state = self.state();
        state.inspections += 1;
        if state.removed {
            return Err(RuntimeError::NotFound(source.to_string()));
        }
        Ok(state.running)
    }
}

/// Reader that counts its own release
struct TrackedReader {
    inner: DuplexStream,
    released: Arc<AtomicUsize>,
}

impl AsyncRead for TrackedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl Drop for TrackedReader {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
