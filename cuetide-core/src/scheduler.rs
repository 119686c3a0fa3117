//! Cooperative tick scheduling capability.

use std::time::Duration;

/// Arm/disarm capability for the controller's recurring scheduling tick.
///
/// The controller asks to be ticked periodically instead of owning a timer.
/// Implementations must treat `disarm` on an unarmed scheduler as a no-op.
pub trait TickScheduler: Send {
    /// Starts (or restarts) the recurring tick at the given interval.
    fn arm(&mut self, interval: Duration);

    /// Stops the recurring tick.
    fn disarm(&mut self);
}

/// Scheduler that ignores arm/disarm requests, for driving the controller
/// manually.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualScheduler;

impl TickScheduler for ManualScheduler {
    fn arm(&mut self, _interval: Duration) {}

    fn disarm(&mut self) {}
}
