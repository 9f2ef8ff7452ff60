/*
[INPUT]:  Raw or multiplexed byte stream from the runtime, cancellation token
[OUTPUT]: Complete lines appended to a LineSink in arrival order
[POS]:    Streaming layer - frame decoding and line splitting
[UPDATE]: When changing framing, line termination, or cancellation semantics
*/

use tailpane_runtime::{FRAME_HEADER_LEN, StreamKind};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{LogError, Result};
use crate::log_buffer::LineSink;

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Incremental decoder for the multiplexed frame format.
///
/// Frames may arrive split across any number of reads.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, appending every completed payload to `out`.
    pub fn push(&mut self, bytes: &[u8], out: &mut Vec<u8>) -> Result<()> {
        self.pending.extend_from_slice(bytes);
        let mut consumed = 0;
        loop {
            let rest = &self.pending[consumed..];
            if rest.len() < FRAME_HEADER_LEN {
                break;
            }
            let len = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
            let end = FRAME_HEADER_LEN + len;
            if rest.len() < end {
                break;
            }
            let payload = &rest[FRAME_HEADER_LEN..end];
            match StreamKind::from_byte(rest[0]) {
                Some(StreamKind::Stdin | StreamKind::Stdout | StreamKind::Stderr) => {
                    out.extend_from_slice(payload);
                }
                Some(StreamKind::System) => {
                    return Err(LogError::StreamSystem(
                        String::from_utf8_lossy(payload).trim_end().to_string(),
                    ));
                }
                None => return Err(LogError::UnknownFrame(rest[0])),
            }
            consumed += end;
        }
        self.pending.drain(..consumed);
        Ok(())
    }

    /// Bytes held back waiting for the rest of a frame
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Incremental `\n` splitter. One trailing `\r` is stripped from each line.
#[derive(Debug, Default)]
pub struct LineSplitter {
    partial: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return the lines they completed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = bytes;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.partial.extend_from_slice(&rest[..pos]);
            if self.partial.last() == Some(&b'\r') {
                self.partial.pop();
            }
            lines.push(String::from_utf8_lossy(&self.partial).into_owned());
            self.partial.clear();
            rest = &rest[pos + 1..];
        }
        self.partial.extend_from_slice(rest);
        lines
    }

    /// Drop the unterminated tail, returning how many bytes were discarded.
    pub fn finish(self) -> usize {
        self.partial.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxExit {
    EndOfStream,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemuxReport {
    pub exit: DemuxExit,
    pub lines: usize,
    pub discarded_bytes: usize,
}

/// Turns one attachment's byte stream into lines on a sink.
#[derive(Debug)]
pub struct StreamDemuxer<S> {
    sink: S,
    frames: Option<FrameDecoder>,
    lines: LineSplitter,
}

impl<S: LineSink> StreamDemuxer<S> {
    /// `tty` streams pass through unchanged; others are frame-decoded first.
    pub fn new(sink: S, tty: bool) -> Self {
        Self {
            sink,
            frames: (!tty).then(FrameDecoder::new),
            lines: LineSplitter::new(),
        }
    }

    /// Read until end-of-stream or cancellation. A read, decode, or sink error
    /// ends the run early. The reader is released on every path.
    pub async fn run<R>(mut self, mut reader: R, cancel: &CancellationToken) -> Result<DemuxReport>
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk = vec![0u8; READ_CHUNK_BYTES];
        let mut decoded = Vec::with_capacity(READ_CHUNK_BYTES);
        let mut appended = 0usize;

        let exit = loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => break DemuxExit::Cancelled,
                read = reader.read(&mut chunk) => read?,
            };
            if read == 0 {
                break DemuxExit::EndOfStream;
            }

            // Payloads decoded ahead of a bad frame are still delivered.
            let (bytes, decoding) = match self.frames.as_mut() {
                Some(frames) => {
                    decoded.clear();
                    let decoding = frames.push(&chunk[..read], &mut decoded);
                    (decoded.as_slice(), decoding)
                }
                None => (&chunk[..read], Ok(())),
            };
            for line in self.lines.push(bytes) {
                self.sink.append_line(line)?;
                appended += 1;
            }
            decoding?;
            trace!(bytes = read, lines = appended, "log chunk demuxed");
        };

        drop(reader);
        let discarded_bytes = self.lines.finish()
            + self.frames.as_ref().map_or(0, FrameDecoder::pending);
        debug!(?exit, lines = appended, discarded_bytes, "demuxer stopped");

        Ok(DemuxReport {
            exit,
            lines: appended,
            discarded_bytes,
        })
    }
}
