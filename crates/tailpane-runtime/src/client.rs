/*
[INPUT]:  Source identity, log options, shared cancellation token
[OUTPUT]: RuntimeClient contract (log stream attach + running-state inspection)
[POS]:    Client layer - abstraction over the container/process runtime
[UPDATE]: When changing the attach contract or log option semantics
*/

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, RuntimeError};

/// Identity of a long-lived source (container id, process name, ...)
pub type SourceId = String;

/// Byte reader handed out by the runtime for one log attachment
pub type LogReader = Box<dyn AsyncRead + Send + Unpin>;

/// Options for opening a log stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    pub show_stdout: bool,
    pub show_stderr: bool,
    /// Prefix each line with its RFC 3339 arrival time
    pub timestamps: bool,
    /// RFC 3339 timestamp or relative window such as `"10m"`
    pub since: Option<String>,
    /// `"all"` or a number of trailing lines
    pub tail: Option<String>,
    pub follow: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            show_stdout: true,
            show_stderr: true,
            timestamps: false,
            since: None,
            tail: None,
            follow: true,
        }
    }
}

impl LogOptions {
    /// Resolve `since` to an absolute cutoff relative to `now`.
    pub fn since_cutoff(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        let Some(raw) = self.since.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if raw.is_empty() {
            return Ok(None);
        }
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Some(at.with_timezone(&Utc)));
        }
        let window = parse_relative(raw)
            .ok_or_else(|| RuntimeError::InvalidOptions(format!("unrecognized since value: {raw}")))?;
        let window = chrono::Duration::from_std(window)
            .map_err(|err| RuntimeError::InvalidOptions(format!("since out of range: {err}")))?;
        Ok(Some(now - window))
    }

    /// Number of trailing lines to replay, `None` meaning everything.
    pub fn tail_limit(&self) -> Result<Option<usize>> {
        match self.tail.as_deref().map(str::trim) {
            None | Some("") | Some("all") => Ok(None),
            Some(raw) => raw
                .parse::<usize>()
                .map(Some)
                .map_err(|_| RuntimeError::InvalidOptions(format!("unrecognized tail value: {raw}"))),
        }
    }
}

fn parse_relative(raw: &str) -> Option<Duration> {
    let split = raw.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = raw.split_at(split);
    let amount: u64 = digits.parse().ok()?;
    let seconds = match unit {
        "s" => amount,
        "m" => amount.checked_mul(60)?,
        "h" => amount.checked_mul(3_600)?,
        "d" => amount.checked_mul(86_400)?,
        _ => return None,
    };
    Some(Duration::from_secs(seconds))
}

/// One attachment to a source's output
pub struct LogStream {
    pub reader: LogReader,
    /// Raw pass-through bytes when `true`, multiplexed frames otherwise
    pub tty: bool,
}

impl std::fmt::Debug for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStream").field("tty", &self.tty).finish_non_exhaustive()
    }
}

/// Runtime operations consumed by the log pipeline.
///
/// Both calls observe `cancel` and return [`RuntimeError::Cancelled`] when it
/// fires before they complete.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Open a log stream for `source`
    async fn open_log_stream(
        &self,
        source: &str,
        options: &LogOptions,
        cancel: &CancellationToken,
    ) -> Result<LogStream>;

    /// Point-in-time check whether `source` is running
    async fn inspect_running(&self, source: &str, cancel: &CancellationToken) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("30s", 30)]
    #[case("10m", 600)]
    #[case("2h", 7_200)]
    #[case("1d", 86_400)]
    fn test_since_relative(#[case] raw: &str, #[case] seconds: i64) {
        let now = Utc::now();
        let options = LogOptions {
            since: Some(raw.to_string()),
            ..LogOptions::default()
        };
        let cutoff = options.since_cutoff(now).unwrap().unwrap();
        assert_eq!((now - cutoff).num_seconds(), seconds);
    }

    #[test]
    fn test_since_absolute_and_invalid() {
        let now = Utc::now();
        let options = LogOptions {
            since: Some("2024-05-01T10:00:00Z".to_string()),
            ..LogOptions::default()
        };
        let cutoff = options.since_cutoff(now).unwrap().unwrap();
        assert_eq!(cutoff.to_rfc3339(), "2024-05-01T10:00:00+00:00");

        let options = LogOptions {
            since: Some("yesterday".to_string()),
            ..LogOptions::default()
        };
        assert!(matches!(
            options.since_cutoff(now),
            Err(RuntimeError::InvalidOptions(_))
        ));
        assert_eq!(LogOptions::default().since_cutoff(now).unwrap(), None);
    }

    #[test]
    fn test_tail_limit() {
        let mut options = LogOptions::default();
        assert_eq!(options.tail_limit().unwrap(), None);
        options.tail = Some("all".to_string());
        assert_eq!(options.tail_limit().unwrap(), None);
        options.tail = Some("300".to_string());
        assert_eq!(options.tail_limit().unwrap(), Some(300));
        options.tail = Some("-1".to_string());
        assert!(options.tail_limit().is_err());
    }
}
