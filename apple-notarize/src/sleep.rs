// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Suspension between notary polls and tool retries. */

use std::time::Duration;

/// Something that can block the current thread for a duration.
///
/// Every wait performed by this crate goes through an implementation of this
/// trait.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// A [Sleeper] backed by [std::thread::sleep].
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration)
    }
}
