/*
[INPUT]:  Failures from attaching, reading, and decoding log streams
[OUTPUT]: LogError taxonomy (attach / read / source gone / output)
[POS]:    Error handling layer - pipeline error types
[UPDATE]: When adding new failure classes to the log pipeline
*/

use tailpane_runtime::RuntimeError;
use thiserror::Error;

/// Errors surfaced by the log pipeline.
///
/// Cancellation is never an error: every component reports it as a normal stop.
#[derive(Error, Debug)]
pub enum LogError {
    /// The log stream could not be opened
    #[error("failed to attach to logs of {source_id}: {error}")]
    Attach {
        source_id: String,
        #[source]
        error: RuntimeError,
    },

    /// Reading the stream failed mid-session
    #[error("log stream read failed: {0}")]
    Read(#[from] std::io::Error),

    /// The runtime injected an error frame into the stream
    #[error("runtime reported: {0}")]
    StreamSystem(String),

    /// A frame header carried an unknown stream kind
    #[error("unrecognized stream frame type {0}")]
    UnknownFrame(u8),

    /// Inspection failed; the source most likely no longer exists
    #[error("source {source_id} is gone: {error}")]
    SourceGone {
        source_id: String,
        #[source]
        error: RuntimeError,
    },

    /// Writing dumped lines to the output failed
    #[error("failed to write logs: {0}")]
    Output(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let attach = LogError::Attach {
            source_id: "web".to_string(),
            error: RuntimeError::NotFound("web".to_string()),
        };
        assert_eq!(
            attach.to_string(),
            "failed to attach to logs of web: source not found: web"
        );

        let read = LogError::Read(std::io::Error::other("reset"));
        assert_eq!(read.to_string(), "log stream read failed: reset");
        assert_eq!(
            LogError::UnknownFrame(7).to_string(),
            "unrecognized stream frame type 7"
        );
    }
}
