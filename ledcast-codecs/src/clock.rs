/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

//! Wall-clock access and frame timing.
//!
//! Producer timestamps are wall-clock, so the receiver paces against the
//! wall clock too (`SystemTime`), not a monotonic source. A large
//! backward clock jump will therefore glitch playback; that is the
//! accepted trade-off for agreeing with the sender about "now".

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, with sub-microsecond resolution.
///
/// The same source feeds the pacing comparisons and the status responses
/// reported back to the producer.
pub fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs_f64()
}

/// Tracks the time between drawn frames and derives an instantaneous FPS.
#[derive(Debug)]
pub struct FrameTimer {
    last_frame: f64,
    delta: f64,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self {
            last_frame: now(),
            delta: 1.0,
        }
    }

    /// Call once per drawn frame. The delta is capped at one full second
    /// so a long idle gap reads as 1 fps rather than a denormal rate.
    pub fn new_frame(&mut self) {
        let current = now();
        self.delta = (current - self.last_frame).min(1.0);
        self.last_frame = current;
    }

    pub fn fps(&self) -> f64 {
        if self.delta > 0.0 {
            1.0 / self.delta
        } else {
            0.0
        }
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}
