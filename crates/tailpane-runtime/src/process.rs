/*
[INPUT]:  Command specs registered under source ids, log options, cancellation token
[OUTPUT]: RuntimeClient backed by local child processes (history replay + live follow)
[POS]:    Runtime layer - local process runtime used by the tailpane binary
[UPDATE]: When changing spawn/restart behaviour, history retention, or relay framing
*/

use std::collections::{HashMap, VecDeque};
use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, DuplexStream};
use tokio::process::{Child, Command};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{LogOptions, LogStream, RuntimeClient, SourceId};
use crate::error::{Result, RuntimeError};
use crate::frame::{StreamKind, encode_frame};

const DEFAULT_HISTORY_CAPACITY: usize = 10_000;
const LIVE_CHANNEL_CAPACITY: usize = 1_024;
const RELAY_BUFFER_BYTES: usize = 64 * 1024;

/// What to do once a source process exits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    Never,
    /// Respawn on the first inspection at least this long after exit
    After(Duration),
}

/// How to launch one source
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Emit raw bytes instead of multiplexed frames
    pub tty: bool,
    pub restart: RestartPolicy,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            tty: false,
            restart: RestartPolicy::Never,
        }
    }

    pub fn with_tty(mut self, tty: bool) -> Self {
        self.tty = tty;
        self
    }

    pub fn with_restart(mut self, restart: RestartPolicy) -> Self {
        self.restart = restart;
        self
    }
}

#[derive(Debug, Clone)]
struct LogRecord {
    at: DateTime<Utc>,
    kind: StreamKind,
    line: Vec<u8>,
}

#[derive(Debug)]
struct OutputLog {
    records: VecDeque<LogRecord>,
    capacity: usize,
    live: Option<broadcast::Sender<LogRecord>>,
}

impl OutputLog {
    fn new(capacity: usize) -> Self {
        let (live, _rx) = broadcast::channel(LIVE_CHANNEL_CAPACITY);
        Self {
            records: VecDeque::new(),
            capacity,
            live: Some(live),
        }
    }

    fn push(&mut self, record: LogRecord) {
        if self.capacity > 0 {
            if self.records.len() >= self.capacity {
                self.records.pop_front();
            }
            self.records.push_back(record.clone());
        }
        if let Some(live) = &self.live {
            let _ = live.send(record);
        }
    }

    fn replay(
        &self,
        filter: &StreamFilter,
        cutoff: Option<DateTime<Utc>>,
        tail: Option<usize>,
    ) -> Vec<LogRecord> {
        let selected: Vec<&LogRecord> = self
            .records
            .iter()
            .filter(|record| filter.wants(record.kind))
            .filter(|record| cutoff.is_none_or(|cutoff| record.at >= cutoff))
            .collect();
        let skip = tail.map_or(0, |tail| selected.len().saturating_sub(tail));
        selected.into_iter().skip(skip).cloned().collect()
    }
}

type OutputLogHandle = Arc<StdMutex<OutputLog>>;

#[derive(Debug)]
struct ManagedProcess {
    spec: CommandSpec,
    child: Child,
    output: OutputLogHandle,
    exited_at: Option<Instant>,
}

/// Runtime client whose sources are local child processes.
///
/// Registering or restarting a source spawns Tokio tasks, so it must be
/// called from within a Tokio runtime.
#[derive(Debug)]
pub struct CommandRuntime {
    processes: StdMutex<HashMap<SourceId, ManagedProcess>>,
    history_capacity: usize,
}

impl CommandRuntime {
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_history_capacity(history_capacity: usize) -> Self {
        Self {
            processes: StdMutex::new(HashMap::new()),
            history_capacity,
        }
    }

    /// Spawn `spec` and track it as `source`, replacing any previous process.
    pub fn register(&self, source: impl Into<SourceId>, spec: CommandSpec) -> Result<()> {
        let source = source.into();
        let process = spawn_process(&source, spec, self.history_capacity)?;
        info!(source = %source, "source process registered");
        lock(&self.processes).insert(source, process);
        Ok(())
    }

    /// Kill and forget `source`. Later calls for it report `NotFound`.
    pub fn remove(&self, source: &str) -> bool {
        let Some(mut process) = lock(&self.processes).remove(source) else {
            return false;
        };
        if let Err(err) = process.child.start_kill() {
            debug!(source = %source, error = %err, "kill on remove failed");
        }
        info!(source = %source, "source process removed");
        true
    }

    pub fn sources(&self) -> Vec<SourceId> {
        let mut ids: Vec<SourceId> = lock(&self.processes).keys().cloned().collect();
        ids.sort();
        ids
    }

    fn lookup(&self, source: &str) -> Result<(OutputLogHandle, bool)> {
        let processes = lock(&self.processes);
        let process = processes
            .get(source)
            .ok_or_else(|| RuntimeError::NotFound(source.to_string()))?;
        Ok((process.output.clone(), process.spec.tty))
    }
}

impl Default for CommandRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuntimeClient for CommandRuntime {
    async fn open_log_stream(
        &self,
        source: &str,
        options: &LogOptions,
        cancel: &CancellationToken,
    ) -> Result<LogStream> {
        if cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }
        let cutoff = options.since_cutoff(Utc::now())?;
        let tail = options.tail_limit()?;
        let (output, tty) = self.lookup(source)?;

        let relay = Relay {
            filter: StreamFilter::from_options(options),
            timestamps: options.timestamps,
            tty,
        };
        // Backlog and subscription are taken under one lock so no record is
        // both replayed and relayed live, or neither.
        let (backlog, live) = {
            let log = lock(&output);
            let backlog = log.replay(&relay.filter, cutoff, tail);
            let live = match (options.follow, log.live.as_ref()) {
                (true, Some(sender)) => Some(sender.subscribe()),
                _ => None,
            };
            (backlog, live)
        };

        debug!(
            source = %source,
            backlog = backlog.len(),
            follow = live.is_some(),
            tty,
            "log stream opened"
        );

        let (reader, writer) = tokio::io::duplex(RELAY_BUFFER_BYTES);
        tokio::spawn(relay.run(writer, backlog, live, cancel.clone()));

        Ok(LogStream {
            reader: Box::new(reader),
            tty,
        })
    }

    async fn inspect_running(&self, source: &str, cancel: &CancellationToken) -> Result<bool> {
        if cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }
        let mut processes = lock(&self.processes);
        let process = processes
            .get_mut(source)
            .ok_or_else(|| RuntimeError::NotFound(source.to_string()))?;

        let status = match process.child.try_wait()? {
            None => return Ok(true),
            Some(status) => status,
        };
        let exited_at = *process.exited_at.get_or_insert_with(|| {
            info!(source = %source, %status, "source process exited");
            Instant::now()
        });

        match process.spec.restart {
            RestartPolicy::After(delay) if exited_at.elapsed() >= delay => {
                *process = spawn_process(source, process.spec.clone(), self.history_capacity)?;
                info!(source = %source, "source process restarted");
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct StreamFilter {
    stdout: bool,
    stderr: bool,
}

impl StreamFilter {
    fn from_options(options: &LogOptions) -> Self {
        Self {
            stdout: options.show_stdout,
            stderr: options.show_stderr,
        }
    }

    fn wants(&self, kind: StreamKind) -> bool {
        match kind {
            StreamKind::Stdout => self.stdout,
            StreamKind::Stderr => self.stderr,
            StreamKind::Stdin | StreamKind::System => true,
        }
    }
}

struct Relay {
    filter: StreamFilter,
    timestamps: bool,
    tty: bool,
}

impl Relay {
    async fn run(
        self,
        mut writer: DuplexStream,
        backlog: Vec<LogRecord>,
        live: Option<broadcast::Receiver<LogRecord>>,
        cancel: CancellationToken,
    ) {
        for record in &backlog {
            if !self.forward(&mut writer, record, &cancel).await {
                return;
            }
        }
        let Some(mut live) = live else {
            return;
        };
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => return,
                received = live.recv() => received,
            };
            match received {
                Ok(record) => {
                    if self.filter.wants(record.kind)
                        && !self.forward(&mut writer, &record, &cancel).await
                    {
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "log follower lagged; records dropped");
                }
                Err(RecvError::Closed) => return,
            }
        }
    }

    /// Returns `false` once the stream should end.
    async fn forward(
        &self,
        writer: &mut DuplexStream,
        record: &LogRecord,
        cancel: &CancellationToken,
    ) -> bool {
        let mut payload = Vec::with_capacity(record.line.len() + 32);
        if self.timestamps {
            payload.extend_from_slice(
                record
                    .at
                    .to_rfc3339_opts(SecondsFormat::Nanos, true)
                    .as_bytes(),
            );
            payload.push(b' ');
        }
        payload.extend_from_slice(&record.line);
        let bytes = if self.tty {
            payload
        } else {
            encode_frame(record.kind, &payload)
        };

        tokio::select! {
            _ = cancel.cancelled() => false,
            written = writer.write_all(&bytes) => written.is_ok(),
        }
    }
}

fn spawn_process(source: &str, spec: CommandSpec, history_capacity: usize) -> Result<ManagedProcess> {
    let mut child = Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| RuntimeError::Spawn {
            source_id: source.to_string(),
            message: err.to_string(),
        })?;

    let output: OutputLogHandle = Arc::new(StdMutex::new(OutputLog::new(history_capacity)));
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let pump_output = output.clone();
    let pump_source = source.to_string();
    tokio::spawn(async move {
        tokio::join!(
            pump(&pump_source, stdout, StreamKind::Stdout, &pump_output),
            pump(&pump_source, stderr, StreamKind::Stderr, &pump_output),
        );
        // Closing the live channel ends every follower's stream.
        lock(&pump_output).live = None;
        debug!(source = %pump_source, "source output closed");
    });

    Ok(ManagedProcess {
        spec,
        child,
        output,
        exited_at: None,
    })
}

async fn pump<R>(source: &str, reader: Option<R>, kind: StreamKind, output: &OutputLogHandle)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => lock(output).push(LogRecord {
                at: Utc::now(),
                kind,
                line: line.clone(),
            }),
            Err(err) => {
                warn!(source = %source, ?kind, error = %err, "reading source output failed");
                break;
            }
        }
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: StreamKind, line: &str) -> LogRecord {
        LogRecord {
            at: Utc::now(),
            kind,
            line: line.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_output_log_capacity_and_tail() {
        let mut log = OutputLog::new(3);
        for line in ["a\n", "b\n", "c\n", "d\n"] {
            log.push(record(StreamKind::Stdout, line));
        }
        let all = StreamFilter {
            stdout: true,
            stderr: true,
        };
        let replayed = log.replay(&all, None, None);
        let lines: Vec<&[u8]> = replayed.iter().map(|r| r.line.as_slice()).collect();
        assert_eq!(lines, vec![&b"b\n"[..], b"c\n", b"d\n"]);

        let tail = log.replay(&all, None, Some(1));
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].line, b"d\n");
    }

    #[test]
    fn test_output_log_stream_filter_applies_before_tail() {
        let mut log = OutputLog::new(10);
        log.push(record(StreamKind::Stdout, "out-1\n"));
        log.push(record(StreamKind::Stderr, "err-1\n"));
        log.push(record(StreamKind::Stdout, "out-2\n"));
        log.push(record(StreamKind::Stderr, "err-2\n"));

        let stdout_only = StreamFilter {
            stdout: true,
            stderr: false,
        };
        let replayed = log.replay(&stdout_only, None, Some(1));
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].line, b"out-2\n");
    }

    #[test]
    fn test_output_log_since_cutoff() {
        let mut log = OutputLog::new(10);
        let mut old = record(StreamKind::Stdout, "old\n");
        old.at = Utc::now() - chrono::Duration::hours(2);
        log.push(old);
        log.push(record(StreamKind::Stdout, "new\n"));

        let all = StreamFilter {
            stdout: true,
            stderr: true,
        };
        let cutoff = Utc::now() - chrono::Duration::minutes(10);
        let replayed = log.replay(&all, Some(cutoff), None);
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].line, b"new\n");
    }
}
