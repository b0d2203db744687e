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

//! Wire codec, playout buffering, and timing primitives for a networked
//! LED matrix receiver.

pub mod clock;
pub mod error;
pub mod frame;
pub mod inflate;
pub mod playout_buffer;
pub mod wire;

pub use error::{Result, WireError};
pub use frame::{Frame, Pixel};
pub use playout_buffer::PlayoutBuffer;
