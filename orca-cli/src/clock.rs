//! Frame clock.
use std::{thread, time::Instant};

use orca::constants::NANOS_IN_SECOND;

/// Timer to synchronize the run loop with the frame rate.
///
/// Time spent outside of [`Clock::wait`] counts towards the
/// current frame.
pub struct Clock {
    last: Instant,
    /// Length of a frame in nanoseconds.
    period: u128,
}

impl Clock {
    pub fn new(frame_rate: u64) -> Self {
        Self {
            last: Instant::now(),
            period: (NANOS_IN_SECOND / frame_rate.max(1)) as u128,
        }
    }

    /// Set the clock state back to zero.
    pub fn reset(&mut self) {
        self.last = Instant::now()
    }

    /// Block the current thread until the next frame.
    pub fn wait(&mut self) {
        while self.last.elapsed().as_nanos() < self.period {
            // Sleep does not have enough resolution, and spinning
            // burns a core. Yielding in a loop is the best alternative.
            thread::yield_now();
        }

        // Reset back to zero, rather than trying to catch up.
        self.reset();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_wait_paces_frames() {
        let start = Instant::now();
        let mut clock = Clock::new(200);
        clock.wait();
        clock.wait();
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
