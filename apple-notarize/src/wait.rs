// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Waiting on notarization results.

[WaitForResults] polls the notary until every submission it was given has
been accepted, one has been rejected, or the wait budget is spent. It is an
iterator: accepted submissions are yielded as soon as they are seen, and
a terminal failure is yielded as the final `Err` item.
*/

use {
    crate::{
        command::ToolRunner,
        notary::{NotarizationResult, Notary, SubmissionId},
        sleep::Sleeper,
        NotarizeError,
    },
    log::{error, info, warn},
    std::{
        collections::{BTreeSet, VecDeque},
        time::Duration,
    },
};

/// Sleep before the second polling round.
pub const INITIAL_POLL_SLEEP: Duration = Duration::from_secs(5);

/// Upper bound for the sleep between polling rounds.
pub const MAX_POLL_SLEEP: Duration = Duration::from_secs(60);

/// Cumulative sleep after which waiting is abandoned.
pub const WAIT_LIMIT: Duration = Duration::from_secs(3600);

/// Exponential backoff between polling rounds.
///
/// Only time spent sleeping counts against [WAIT_LIMIT]; time spent in tool
/// invocations does not.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Backoff {
    current: Duration,
    total: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            current: INITIAL_POLL_SLEEP,
            total: Duration::ZERO,
        }
    }
}

impl Backoff {
    /// The duration of the next sleep.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Total time slept so far.
    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn exhausted(&self) -> bool {
        self.total >= WAIT_LIMIT
    }

    /// Sleep for the current duration and advance.
    pub fn sleep(&mut self, sleeper: &dyn Sleeper) {
        sleeper.sleep(self.current);
        self.total += self.current;
        self.current = std::cmp::min(self.current * 2, MAX_POLL_SLEEP);
    }
}

/// Iterator over accepted submissions.
///
/// Yields `Ok` for every accepted submission in the order the notary reports
/// them. Yields a single `Err` and then ends if a submission is rejected, a
/// query fails, or [WAIT_LIMIT] is reached.
pub struct WaitForResults<'a, R: ToolRunner> {
    notary: &'a Notary<R>,
    sleeper: &'a dyn Sleeper,
    pending: BTreeSet<SubmissionId>,
    round: VecDeque<SubmissionId>,
    backoff: Backoff,
    done: bool,
}

impl<'a, R: ToolRunner> WaitForResults<'a, R> {
    /// Begin waiting on `ids`.
    ///
    /// Errors if `ids` is empty.
    pub fn new(
        notary: &'a Notary<R>,
        ids: impl IntoIterator<Item = SubmissionId>,
        sleeper: &'a dyn Sleeper,
    ) -> Result<Self, NotarizeError> {
        let pending = ids.into_iter().collect::<BTreeSet<_>>();

        if pending.is_empty() {
            return Err(NotarizeError::NoSubmissions);
        }

        let round = pending.iter().cloned().collect();

        Ok(Self {
            notary,
            sleeper,
            pending,
            round,
            backoff: Backoff::default(),
            done: false,
        })
    }

    /// Submissions not yet resolved.
    pub fn pending(&self) -> impl Iterator<Item = &SubmissionId> {
        self.pending.iter()
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    fn fail(&mut self, err: NotarizeError) -> Option<Result<SubmissionId, NotarizeError>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<'a, R: ToolRunner> Iterator for WaitForResults<'a, R> {
    type Item = Result<SubmissionId, NotarizeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while !self.pending.is_empty() {
            let id = match self.round.pop_front() {
                Some(id) => id,
                None => {
                    if self.backoff.exhausted() {
                        warn!(
                            "gave up waiting after {}s",
                            self.backoff.total().as_secs()
                        );
                        let ids = self.pending.iter().cloned().collect();
                        return self.fail(NotarizeError::WaitTimeout(ids));
                    }

                    info!(
                        "waiting {}s on notarization of {} submission(s)",
                        self.backoff.current().as_secs(),
                        self.pending.len()
                    );
                    self.backoff.sleep(self.sleeper);
                    self.round = self.pending.iter().cloned().collect();
                    continue;
                }
            };

            match self.notary.query(&id) {
                Err(err) => return self.fail(err),
                Ok(NotarizationResult::InProgress) => {}
                Ok(NotarizationResult::Success { .. }) => {
                    self.pending.remove(&id);
                    info!("{} notarized successfully", id);

                    return Some(Ok(id));
                }
                Ok(NotarizationResult::Error {
                    status,
                    output,
                    log,
                }) => {
                    error!("notarization of {} failed with status {}", id, status);
                    for line in output.lines() {
                        error!("{} output> {}", id, line);
                    }
                    match log {
                        Some(log) => {
                            for line in log.lines() {
                                error!("{} log> {}", id, line);
                            }
                        }
                        None => error!("{} log unavailable", id),
                    }

                    return self.fail(NotarizeError::SubmissionFailed { id, status });
                }
            }
        }

        self.done = true;
        None
    }
}

/// Wait on `ids` with the notary, sleeping via `sleeper`.
///
/// This is just a convenience around [WaitForResults::new()].
pub fn wait_for_results<'a, R: ToolRunner>(
    notary: &'a Notary<R>,
    ids: impl IntoIterator<Item = SubmissionId>,
    sleeper: &'a dyn Sleeper,
) -> Result<WaitForResults<'a, R>, NotarizeError> {
    WaitForResults::new(notary, ids, sleeper)
}
