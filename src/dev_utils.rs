// src/dev_utils.rs

use std::time::Instant;

/// Measures how long a scope takes. The timing is logged at debug level when
/// the timer is dropped, so keep it bound to a named variable (`_timer`, not `_`).
#[derive(Debug)]
pub struct BlockTimer {
    name: String,
    start: Instant,
}

impl BlockTimer {
    /// Starts timing the block labelled `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for BlockTimer {
    fn drop(&mut self) {
        log::debug!(
            "{} took {} µs",
            self.name,
            self.start.elapsed().as_micros()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_timer_measures_from_creation() {
        let timer = BlockTimer::new("noop");
        assert_eq!(timer.name, "noop");
        assert!(timer.start.elapsed().as_secs() < 5);
    }
}
