/*
[INPUT]:  Complete log lines from the stream demuxer
[OUTPUT]: Thread-safe indexed line store with snapshot reads
[POS]:    Storage layer - the one structure shared by streaming, liveness, and render tasks
[UPDATE]: When changing retention, indexing, or locking granularity
*/

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use crate::error::Result;

/// One stored line. `index` is assigned on append and never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub index: usize,
    pub text: Arc<str>,
}

#[derive(Debug, Default)]
struct Lines {
    lines: VecDeque<LogLine>,
    next_index: usize,
    max_lines: Option<usize>,
}

/// Cloneable handle to one session's lines.
///
/// Every operation takes the lock once, so a snapshot never observes a
/// half-appended line and appends never interleave. A new session gets a new
/// buffer instead of clearing this one.
#[derive(Debug, Clone, Default)]
pub struct LineBuffer {
    inner: Arc<StdMutex<Lines>>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_lines`, evicting the oldest. Retained lines keep their index.
    pub fn with_max_lines(max_lines: Option<usize>) -> Self {
        Self {
            inner: Arc::new(StdMutex::new(Lines {
                max_lines,
                ..Lines::default()
            })),
        }
    }

    /// Append a line, returning the index it was given.
    pub fn append(&self, text: impl Into<Arc<str>>) -> usize {
        let mut guard = self.lock();
        let index = guard.next_index;
        guard.next_index += 1;
        if let Some(max) = guard.max_lines {
            if max == 0 {
                return index;
            }
            while guard.lines.len() >= max {
                guard.lines.pop_front();
            }
        }
        guard.lines.push_back(LogLine {
            index,
            text: text.into(),
        });
        index
    }

    pub fn snapshot(&self) -> Vec<LogLine> {
        self.lock().lines.iter().cloned().collect()
    }

    /// Number of retained lines
    pub fn count(&self) -> usize {
        self.lock().lines.len()
    }

    /// Number of lines ever appended (the next index to be assigned)
    pub fn next_index(&self) -> usize {
        self.lock().next_index
    }

    /// `true` when both handles point at the same buffer instance
    pub fn same_buffer(&self, other: &LineBuffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn lock(&self) -> MutexGuard<'_, Lines> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Destination for complete lines produced by a splitter.
///
/// An error stops the producer.
pub trait LineSink {
    fn append_line(&mut self, line: String) -> Result<()>;
}

impl LineSink for LineBuffer {
    fn append_line(&mut self, line: String) -> Result<()> {
        self.append(line);
        Ok(())
    }
}

impl<S: LineSink + ?Sized> LineSink for &mut S {
    fn append_line(&mut self, line: String) -> Result<()> {
        (**self).append_line(line)
    }
}
