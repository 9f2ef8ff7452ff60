/*
[INPUT]:  RuntimeClient, source id, AppConfig, a TextSurface or a plain writer
[OUTPUT]: LogSessionHandle (interactive) and dump_logs (one-shot stdout variant)
[POS]:    Orchestration layer - wires poller, demuxer, and renderer under one lifetime token
[UPDATE]: When changing session startup/shutdown or the dump variant
*/

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tailpane_runtime::{RuntimeClient, SourceId};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::demux::{DemuxExit, DemuxReport, StreamDemuxer};
use crate::error::{LogError, Result};
use crate::liveness::{LivenessPoller, SessionState, Termination};
use crate::log_buffer::{LineBuffer, LineSink};
use crate::render::{RenderExit, RenderOptions, RenderScheduler, SearchCommand, SearchStatus};
use crate::surface::TextSurface;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const SEARCH_QUEUE: usize = 32;

/// Renders the logs of one source into a surface.
pub struct LogSession;

impl LogSession {
    /// Spawn the liveness poller (which owns the demuxer) and the render
    /// scheduler under one lifetime token.
    pub fn start<S>(
        client: Arc<dyn RuntimeClient>,
        source: impl Into<SourceId>,
        config: &AppConfig,
        surface: S,
    ) -> LogSessionHandle
    where
        S: TextSurface + 'static,
    {
        let source = source.into();
        let cancel = CancellationToken::new();

        let poller = LivenessPoller::new(
            client,
            source.clone(),
            config.log_options(),
            config.liveness_interval(),
            config.logs.max_lines,
        );
        let buffers = poller.buffers();
        let states = poller.states();

        let (search_tx, search_rx) = mpsc::channel(SEARCH_QUEUE);
        let scheduler = RenderScheduler::new(
            surface,
            poller.buffers(),
            search_rx,
            RenderOptions {
                interval: config.render_interval(),
                line_numbers: config.gui.line_numbers,
                search_mode: config.gui.search_mode,
            },
        );
        let status = scheduler.status();
        let (done_tx, render_done) = oneshot::channel();

        info!(source = %source, "starting log session");
        let poller_task = tokio::spawn(poller.run(cancel.clone()));
        let render_task = tokio::spawn(scheduler.run(cancel.clone(), done_tx));

        LogSessionHandle {
            source,
            cancel,
            search_tx,
            states,
            status,
            buffers,
            poller_task,
            render_task,
            render_done,
        }
    }
}

/// Owner's handle to a running session
pub struct LogSessionHandle {
    source: SourceId,
    cancel: CancellationToken,
    search_tx: mpsc::Sender<SearchCommand>,
    states: watch::Receiver<SessionState>,
    status: watch::Receiver<SearchStatus>,
    buffers: watch::Receiver<LineBuffer>,
    poller_task: JoinHandle<Termination>,
    render_task: JoinHandle<RenderExit>,
    render_done: oneshot::Receiver<RenderExit>,
}

impl LogSessionHandle {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Sender for search input; commands are applied on the next redraw.
    pub fn search(&self) -> mpsc::Sender<SearchCommand> {
        self.search_tx.clone()
    }

    pub fn state(&self) -> SessionState {
        *self.states.borrow()
    }

    pub fn states(&self) -> watch::Receiver<SessionState> {
        self.states.clone()
    }

    pub fn search_status(&self) -> watch::Receiver<SearchStatus> {
        self.status.clone()
    }

    /// Buffer of the current stream session
    pub fn buffer(&self) -> LineBuffer {
        self.buffers.borrow().clone()
    }

    /// Cancel the session and wait for every task to stop.
    pub async fn stop(self) -> Termination {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the session to end on its own (source removed or attach failed).
    pub async fn join(self) -> Termination {
        let Self {
            source,
            cancel,
            mut poller_task,
            mut render_task,
            render_done,
            ..
        } = self;

        let termination = tokio::select! {
            joined = &mut poller_task => match joined {
                Ok(termination) => termination,
                Err(join_error) => {
                    error!(source = %source, "liveness poller failed: {join_error}");
                    cancel.cancel();
                    Termination::Cancelled
                }
            },
            _ = tokio::time::sleep(SHUTDOWN_TIMEOUT), if cancel.is_cancelled() => {
                warn!(source = %source, "liveness poller did not stop in time, aborting");
                poller_task.abort();
                Termination::Cancelled
            }
        };

        // The renderer stops once the poller drops its buffer publisher.
        let exit = tokio::select! {
            done = render_done => done.ok(),
            _ = tokio::time::sleep(SHUTDOWN_TIMEOUT) => {
                warn!(source = %source, "render scheduler did not stop in time, aborting");
                render_task.abort();
                None
            }
        };
        if exit.is_some() {
            let _ = (&mut render_task).await;
        }

        info!(source = %source, ?termination, render_exit = ?exit, "log session stopped");
        termination
    }
}

/// Writes each line to an output stream
struct WriterSink<W> {
    writer: W,
}

impl<W: Write> LineSink for WriterSink<W> {
    fn append_line(&mut self, line: String) -> Result<()> {
        writeln!(self.writer, "{line}").map_err(LogError::Output)
    }
}

/// Attach once and copy every complete line to `writer` until the stream
/// ends, `cancel` fires, or writing fails. No liveness supervision, no restarts.
pub async fn dump_logs<W: Write>(
    client: &dyn RuntimeClient,
    source: &str,
    config: &AppConfig,
    writer: W,
    cancel: &CancellationToken,
) -> Result<DemuxReport> {
    let stream = match client
        .open_log_stream(source, &config.log_options(), cancel)
        .await
    {
        Ok(stream) => stream,
        Err(error) if error.is_cancelled() => {
            return Ok(DemuxReport {
                exit: DemuxExit::Cancelled,
                lines: 0,
                discarded_bytes: 0,
            });
        }
        Err(error) => {
            return Err(LogError::Attach {
                source_id: source.to_string(),
                error,
            });
        }
    };

    let mut sink = WriterSink { writer };
    let outcome = StreamDemuxer::new(&mut sink, stream.tty)
        .run(stream.reader, cancel)
        .await;
    // Lines written before a failure still reach the output.
    let flushed = sink.writer.flush().map_err(LogError::Output);
    let report = outcome?;
    flushed?;
    info!(source, lines = report.lines, exit = ?report.exit, "log dump finished");
    Ok(report)
}
