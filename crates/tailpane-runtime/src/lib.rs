/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public tailpane-runtime crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod client;
pub mod error;
pub mod frame;
pub mod mock;
pub mod process;

// Re-export commonly used types from client
pub use client::{LogOptions, LogReader, LogStream, RuntimeClient, SourceId};

// Re-export error types
pub use error::{Result, RuntimeError};

pub use frame::{FRAME_HEADER_LEN, StreamKind, encode_frame};
pub use mock::MockRuntime;
pub use process::{CommandRuntime, CommandSpec, RestartPolicy};
