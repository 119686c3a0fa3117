//! Simulated playback position.

use std::sync::Arc;

use cuetide_core::traits::PlaybackClock;
use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct Anchor {
    at: Instant,
    position: f64,
}

/// Playback clock advancing with tokio time at a fixed rate.
///
/// Uses tokio's clock so that paused-time tests advance playback together
/// with the engine's timers. Position is clamped to `[0, end]`.
#[derive(Debug)]
pub struct SimulatedPlayback {
    anchor: Mutex<Anchor>,
    rate: f64,
    end: f64,
}

impl SimulatedPlayback {
    /// Starts playback at `position`.
    pub fn start(position: f64, rate: f64, end: f64) -> Arc<Self> {
        Arc::new(Self {
            anchor: Mutex::new(Anchor {
                at: Instant::now(),
                position,
            }),
            rate,
            end,
        })
    }

    /// Jumps to `position` and keeps playing from there.
    pub fn seek(&self, position: f64) {
        let mut anchor = self.anchor.lock();
        anchor.at = Instant::now();
        anchor.position = position.clamp(0.0, self.end);
    }
}

impl PlaybackClock for SimulatedPlayback {
    fn current_time(&self) -> f64 {
        let anchor = self.anchor.lock();
        let played = anchor.at.elapsed().as_secs_f64() * self.rate;
        (anchor.position + played).clamp(0.0, self.end)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_position_follows_rate() {
        let playback = SimulatedPlayback::start(0.0, 2.0, 100.0);

        tokio::time::advance(Duration::from_secs(3)).await;

        assert!((playback.current_time() - 6.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_rebases_and_clamps() {
        let playback = SimulatedPlayback::start(0.0, 1.0, 100.0);
        tokio::time::advance(Duration::from_secs(5)).await;

        playback.seek(80.0);
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(playback.current_time(), 100.0);
    }
}
