//! Actor-based driver for the stream controller.
//!
//! The engine owns a [`StreamController`](crate::controller::StreamController)
//! on a dedicated task, executes the work it requests against the
//! [`Collaborators`], and feeds completions back in order.

pub mod actor;
pub mod commands;
pub mod handle;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_mocks;

pub use actor::{Collaborators, IntervalScheduler, spawn_stream_engine};
pub use commands::StreamEngineCommand;
pub use handle::StreamEngineHandle;
