/*
[INPUT]:  Sessions and surfaces under test
[OUTPUT]: Shared test utilities: fast config, condition polling, line extraction
[POS]:    Test infrastructure - shared across session integration tests
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for tailpane tests

use std::time::Duration;

use tailpane::{AppConfig, SharedLogView};
use tailpane_runtime::MockRuntime;

/// Config with short render and liveness intervals
#[allow(dead_code)]
pub fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.gui.render_interval_ms = 10;
    config.gui.liveness_interval_ms = 10;
    config
}

/// Poll `check` every 5ms until it returns true or `limit` elapses
#[allow(dead_code)]
pub async fn wait_until(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

/// Raw text currently written to the view
#[allow(dead_code)]
pub fn view_texts(view: &SharedLogView) -> Vec<String> {
    view.with(|view| view.lines().iter().map(|l| l.text.to_string()).collect())
}

/// Wait until the mock has a stream attached that `emit` can write to
#[allow(dead_code)]
pub async fn wait_attached(runtime: &MockRuntime, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if runtime.is_attached().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
