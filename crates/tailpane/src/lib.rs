/*
[INPUT]:  Public API exports for the tailpane crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod demux;
pub mod error;
pub mod liveness;
pub mod log_buffer;
pub mod render;
pub mod search;
pub mod session;
pub mod surface;

// Re-export main types for convenience
pub use config::{AppConfig, SearchMode};
pub use demux::{DemuxExit, DemuxReport, StreamDemuxer};
pub use error::{LogError, Result};
pub use liveness::{LivenessPoller, SessionState, StreamSession, Termination};
pub use log_buffer::{LineBuffer, LineSink, LogLine};
pub use render::{RenderScheduler, SearchCommand, SearchStatus};
pub use search::{SearchState, apply_highlight};
pub use session::{LogSession, LogSessionHandle, dump_logs};
pub use surface::{LogView, SharedLogView, TextSurface};
