/*
[INPUT]:  RuntimeClient, source id, attach options, poll interval, lifetime token
[OUTPUT]: Supervised stream sessions; current LineBuffer and SessionState via watch channels
[POS]:    Supervision layer - restarts the demuxer when the source restarts
[UPDATE]: When changing liveness transitions or termination rules
*/

use std::sync::Arc;
use std::time::Duration;

use tailpane_runtime::{LogOptions, LogStream, RuntimeClient, SourceId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::demux::{DemuxReport, StreamDemuxer};
use crate::error::{LogError, Result};
use crate::log_buffer::LineBuffer;

const SESSION_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Why a session ended. Reached exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The lifetime token was cancelled
    Cancelled,
    /// Inspection failed; the source no longer exists
    SourceGone,
    /// The log stream could not be opened
    AttachFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Streaming,
    WaitingForRestart,
    Terminated(Termination),
}

impl SessionState {
    pub fn is_terminated(&self) -> bool {
        matches!(self, SessionState::Terminated(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Init => "attaching",
            SessionState::Streaming => "streaming",
            SessionState::WaitingForRestart => "waiting for restart",
            SessionState::Terminated(Termination::Cancelled) => "stopped",
            SessionState::Terminated(Termination::SourceGone) => "source gone",
            SessionState::Terminated(Termination::AttachFailed) => "attach failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Liveness {
    Running,
    Stopped,
}

/// One attachment: a demuxer task feeding exactly one buffer.
#[derive(Debug)]
pub struct StreamSession {
    id: Uuid,
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<Result<DemuxReport>>,
}

impl StreamSession {
    /// Start demuxing `stream` into `buffer` until `cancel` fires or the stream ends.
    pub fn spawn(
        stream: LogStream,
        buffer: LineBuffer,
        cancel: CancellationToken,
        generation: u64,
    ) -> Self {
        let demuxer = StreamDemuxer::new(buffer, stream.tty);
        let token = cancel.clone();
        let reader = stream.reader;
        let handle = tokio::spawn(async move { demuxer.run(reader, &token).await });
        Self {
            id: Uuid::new_v4(),
            generation,
            cancel,
            handle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The demuxer has returned (end-of-stream, read error, or cancellation)
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the demuxer and wait for it. The buffer is left intact.
    pub async fn stop(self) -> Option<Result<DemuxReport>> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the demuxer to return on its own.
    pub async fn join(self) -> Option<Result<DemuxReport>> {
        let Self {
            id,
            generation,
            mut handle,
            ..
        } = self;
        tokio::select! {
            joined = &mut handle => match joined {
                Ok(result) => Some(result),
                Err(join_error) => {
                    error!(%id, generation, "demuxer task failed: {join_error}");
                    None
                }
            },
            _ = tokio::time::sleep(SESSION_STOP_TIMEOUT) => {
                warn!(%id, generation, "demuxer did not stop in time, aborting");
                handle.abort();
                None
            }
        }
    }
}

/// Supervises stream sessions for one source.
///
/// Polls the runtime on a fixed interval. A stopped source keeps its buffer;
/// a source that comes back gets a new session with a new buffer, published
/// through the buffer channel so readers never see lines from two processes.
pub struct LivenessPoller {
    client: Arc<dyn RuntimeClient>,
    source: SourceId,
    options: LogOptions,
    interval: Duration,
    max_lines: Option<usize>,
    buffer_tx: watch::Sender<LineBuffer>,
    state_tx: watch::Sender<SessionState>,
    generation: u64,
}

impl LivenessPoller {
    pub fn new(
        client: Arc<dyn RuntimeClient>,
        source: impl Into<SourceId>,
        options: LogOptions,
        interval: Duration,
        max_lines: Option<usize>,
    ) -> Self {
        let (buffer_tx, _) = watch::channel(LineBuffer::with_max_lines(max_lines));
        let (state_tx, _) = watch::channel(SessionState::Init);
        Self {
            client,
            source: source.into(),
            options,
            interval,
            max_lines,
            buffer_tx,
            state_tx,
            generation: 0,
        }
    }

    /// Handle to the buffer of the current session; changes on every restart.
    pub fn buffers(&self) -> watch::Receiver<LineBuffer> {
        self.buffer_tx.subscribe()
    }

    pub fn states(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Attach and supervise until cancelled, the source disappears, or an attach fails.
    pub async fn run(mut self, cancel: CancellationToken) -> Termination {
        let initial = self.buffer_tx.borrow().clone();
        let mut session = match self.attach(initial, &cancel).await {
            Ok(session) => Some(session),
            Err(termination) => return self.terminate(None, termination).await,
        };
        self.publish_state(SessionState::Streaming);

        let mut liveness = Liveness::Running;
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let termination = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Termination::Cancelled,
                _ = ticker.tick() => {}
            }

            let running = match self.client.inspect_running(&self.source, &cancel).await {
                Ok(running) => running,
                Err(error) if error.is_cancelled() => break Termination::Cancelled,
                Err(error) => {
                    let error = LogError::SourceGone {
                        source_id: self.source.clone(),
                        error,
                    };
                    error!(source = %self.source, "{error}");
                    break Termination::SourceGone;
                }
            };

            match (liveness, running) {
                (Liveness::Running, false) => {
                    info!(source = %self.source, "source stopped, waiting for restart");
                    if let Some(current) = session.take() {
                        let generation = current.generation();
                        self.log_outcome(generation, current.stop().await);
                    }
                    liveness = Liveness::Stopped;
                    self.publish_state(SessionState::WaitingForRestart);
                }
                (Liveness::Stopped, true) => {
                    info!(source = %self.source, "source running again, re-attaching");
                    match self.restart(&cancel).await {
                        Ok(next) => session = Some(next),
                        Err(termination) => break termination,
                    }
                    liveness = Liveness::Running;
                    self.publish_state(SessionState::Streaming);
                }
                (Liveness::Running, true) => {
                    // A finished demuxer keeps its buffer; only a stop/run
                    // transition attaches again.
                    if let Some(current) = session.take_if(|current| current.is_finished()) {
                        let generation = current.generation();
                        info!(
                            source = %self.source,
                            generation,
                            "log stream ended while source is running"
                        );
                        self.log_outcome(generation, current.join().await);
                    }
                }
                (Liveness::Stopped, false) => {}
            }
        };

        self.terminate(session, termination).await
    }

    async fn attach(
        &mut self,
        buffer: LineBuffer,
        cancel: &CancellationToken,
    ) -> std::result::Result<StreamSession, Termination> {
        self.generation += 1;
        match self
            .client
            .open_log_stream(&self.source, &self.options, cancel)
            .await
        {
            Ok(stream) => {
                let session =
                    StreamSession::spawn(stream, buffer, cancel.child_token(), self.generation);
                debug!(
                    source = %self.source,
                    session = %session.id(),
                    generation = self.generation,
                    "attached to log stream"
                );
                Ok(session)
            }
            Err(error) if error.is_cancelled() => Err(Termination::Cancelled),
            Err(error) => {
                let error = LogError::Attach {
                    source_id: self.source.clone(),
                    error,
                };
                error!(source = %self.source, "{error}");
                Err(Termination::AttachFailed)
            }
        }
    }

    /// Attach with a fresh buffer and publish it once the attach succeeded.
    async fn restart(
        &mut self,
        cancel: &CancellationToken,
    ) -> std::result::Result<StreamSession, Termination> {
        let buffer = LineBuffer::with_max_lines(self.max_lines);
        let session = self.attach(buffer.clone(), cancel).await?;
        self.buffer_tx.send_replace(buffer);
        Ok(session)
    }

    async fn terminate(
        &self,
        session: Option<StreamSession>,
        termination: Termination,
    ) -> Termination {
        if let Some(current) = session {
            let generation = current.generation();
            self.log_outcome(generation, current.stop().await);
        }
        info!(source = %self.source, ?termination, "log session terminated");
        self.publish_state(SessionState::Terminated(termination));
        termination
    }

    fn publish_state(&self, state: SessionState) {
        debug!(source = %self.source, ?state, "session state");
        self.state_tx.send_replace(state);
    }

    fn log_outcome(&self, generation: u64, outcome: Option<Result<DemuxReport>>) {
        match outcome {
            Some(Ok(report)) => debug!(
                source = %self.source,
                generation,
                exit = ?report.exit,
                lines = report.lines,
                discarded_bytes = report.discarded_bytes,
                "stream session ended"
            ),
            Some(Err(error)) => {
                warn!(source = %self.source, generation, "log stream stopped: {error}")
            }
            None => {}
        }
    }
}
