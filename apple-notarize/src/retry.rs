// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Bounded retries for operations that may transiently fail.

A [Retry] is created per operation and consulted on every failed attempt.
Callers either drive the loop themselves:

```ignore
let mut retry = Retry::new("staple Foo.app", true, &sleeper);
while retry.should_continue()? {
    match attempt() {
        Ok(()) => return Ok(()),
        Err(e) if is_transient(&e) => {
            if !retry.fail_and_decide_retry(&e.to_string()) {
                return Err(e);
            }
        }
        Err(e) => return Err(e),
    }
}
```

or hand the body to [Retry::run], which does exactly that.
*/

use {
    crate::{sleep::Sleeper, NotarizeError},
    log::warn,
    std::time::Duration,
};

/// Maximum number of attempts for a retried operation.
pub const MAX_RETRIES: u32 = 3;

/// How long to wait before retrying when a wait is requested.
pub const RETRY_WAIT: Duration = Duration::from_secs(30);

/// Attempt accounting for a single operation.
pub struct Retry<'a> {
    description: String,
    sleep_before_retry: bool,
    attempt: u32,
    sleeper: &'a dyn Sleeper,
}

impl<'a> Retry<'a> {
    /// Start accounting for a new operation.
    ///
    /// `description` is included in log messages. When `sleep_before_retry` is
    /// set, every retry is preceded by a [RETRY_WAIT] pause.
    pub fn new(
        description: impl ToString,
        sleep_before_retry: bool,
        sleeper: &'a dyn Sleeper,
    ) -> Self {
        Self {
            description: description.to_string(),
            sleep_before_retry,
            attempt: 0,
            sleeper,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Number of failed attempts recorded so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether another attempt may be made.
    ///
    /// Returns `Err` if all attempts have been used up. That only happens if the
    /// loop body ignored a `false` from [Self::fail_and_decide_retry].
    pub fn should_continue(&self) -> Result<bool, NotarizeError> {
        if self.attempt < MAX_RETRIES {
            Ok(true)
        } else {
            Err(NotarizeError::RetryPolicyMisuse(self.description.clone()))
        }
    }

    /// Record a failed attempt and decide whether to try again.
    ///
    /// Returns `true` after logging (and sleeping, if configured) when attempts
    /// remain. Returns `false` once [MAX_RETRIES] attempts have failed.
    pub fn fail_and_decide_retry(&mut self, message: &str) -> bool {
        if self.attempt < MAX_RETRIES {
            self.attempt += 1;
        }

        if self.attempt >= MAX_RETRIES {
            return false;
        }

        let when = if self.sleep_before_retry {
            format!("after {} seconds", RETRY_WAIT.as_secs())
        } else {
            "immediately".to_string()
        };
        warn!(
            "retrying {} {} (attempt {} of {}): {}",
            self.description,
            when,
            self.attempt + 1,
            MAX_RETRIES,
            message
        );

        if self.sleep_before_retry {
            self.sleeper.sleep(RETRY_WAIT);
        }

        true
    }

    /// Run `body` until it succeeds, fails terminally, or attempts run out.
    ///
    /// Errors for which `is_transient` returns `true` are retried. The last
    /// transient error is returned once no attempts remain.
    pub fn run<T>(
        &mut self,
        mut body: impl FnMut() -> Result<T, NotarizeError>,
        is_transient: impl Fn(&NotarizeError) -> bool,
    ) -> Result<T, NotarizeError> {
        while self.should_continue()? {
            match body() {
                Ok(value) => return Ok(value),
                Err(err) if is_transient(&err) => {
                    if !self.fail_and_decide_retry(&err.to_string()) {
                        return Err(err);
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Err(NotarizeError::RetryPolicyMisuse(self.description.clone()))
    }
}
