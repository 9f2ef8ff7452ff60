/*
[INPUT]:  Byte streams produced by runtime clients under test
[OUTPUT]: Shared test utilities: frame parsing, condition polling
[POS]:    Test infrastructure - shared across runtime integration tests
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for tailpane-runtime tests

use std::time::Duration;

use tailpane_runtime::{FRAME_HEADER_LEN, StreamKind};

/// Split a multiplexed byte buffer into (kind, payload) pairs
pub fn parse_frames(mut bytes: &[u8]) -> Vec<(StreamKind, Vec<u8>)> {
    let mut frames = Vec::new();
    while bytes.len() >= FRAME_HEADER_LEN {
        let kind = StreamKind::from_byte(bytes[0]).expect("known stream kind");
        let len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let end = FRAME_HEADER_LEN + len;
        frames.push((kind, bytes[FRAME_HEADER_LEN..end].to_vec()));
        bytes = &bytes[end..];
    }
    assert!(bytes.is_empty(), "trailing partial frame");
    frames
}

/// Poll `check` every 10ms until it returns true or `limit` elapses
#[allow(dead_code)]
pub async fn wait_until<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
