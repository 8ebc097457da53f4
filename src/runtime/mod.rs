//! Async plumbing around the engine: the single-writer task, event sources and
//! stream lifecycle.

pub mod handle;
pub mod source;
pub mod stream;

pub use handle::EngineHandle;
pub use source::{ChannelSource, EventSource, JsonLinesSource};
pub use stream::{StreamEnd, StreamHandle, StreamReport, StreamSupervisor};
