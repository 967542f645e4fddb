use std::{thread, time::Duration};

use super::CancelToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEnd {
    Elapsed,
    Aborted { remaining: u32 },
}

pub struct CountdownTimer {
    seconds: i64,
    tick: Duration,
}

impl CountdownTimer {
    pub fn new(seconds: i64, tick: Duration) -> Self {
        Self { seconds, tick }
    }

    /// Counts `seconds` down to 1, calling `on_tick` then sleeping one tick
    /// each time. The token is checked before every tick and once more after
    /// the last one, so a zero or negative length still honours an abort that
    /// arrived earlier.
    pub fn run(&self, cancel: &CancelToken, mut on_tick: impl FnMut(u32)) -> CountdownEnd {
        let total = u32::try_from(self.seconds.max(0)).unwrap_or(u32::MAX);
        for remaining in (1..=total).rev() {
            if cancel.is_cancelled() {
                return CountdownEnd::Aborted { remaining };
            }
            on_tick(remaining);
            thread::sleep(self.tick);
        }
        if cancel.is_cancelled() {
            return CountdownEnd::Aborted { remaining: 0 };
        }
        CountdownEnd::Elapsed
    }
}
