// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Attach notarization tickets to signed entities.

Stapling refers to the act of taking an Apple issued notarization ticket and
attaching that ticket to the entity that was uploaded. Here that work is
delegated to `xcrun stapler`, which occasionally fails for reasons that go
away on their own (e.g. the ticket not yet being visible on Apple's CDN).
*/

use {
    crate::{command::ToolRunner, retry::Retry, sleep::Sleeper, NotarizeError},
    log::{info, warn},
};

/// `stapler` exit codes that are worth retrying.
///
/// 65 is `EX_DATAERR`, returned when no ticket can be found yet. 68 is
/// `EX_NOHOST`, returned when Apple's servers can't be reached.
pub const TRANSIENT_STAPLE_EXIT_CODES: [i32; 2] = [65, 68];

/// Bundle extensions that receive stapled tickets.
const STAPLEABLE_EXTENSIONS: [&str; 2] = [".app", ".xpc"];

/// A part of a bundle, identified by its path relative to the bundle's parent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BundlePart {
    pub path: String,
}

impl BundlePart {
    pub fn new(path: impl ToString) -> Self {
        Self {
            path: path.to_string(),
        }
    }
}

/// Whether a path names something tickets get stapled to.
pub fn is_stapleable(path: &str) -> bool {
    STAPLEABLE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Whether an error from `stapler` should be retried.
pub fn is_transient_staple_error(err: &NotarizeError) -> bool {
    matches!(err.tool_exit_code(), Some(code) if TRANSIENT_STAPLE_EXIT_CODES.contains(&code))
}

/// Select the stapleable parts, ordered so nested bundles come first.
///
/// Paths are sorted in reverse lexicographic order. A nested bundle's path
/// extends its parent's path and therefore sorts before it.
pub fn staple_order(parts: &[BundlePart]) -> Vec<&str> {
    let mut paths = parts
        .iter()
        .map(|part| part.path.as_str())
        .filter(|path| is_stapleable(path))
        .collect::<Vec<_>>();

    paths.sort_unstable_by(|a, b| b.cmp(a));

    paths
}

/// Handles stapling operations.
pub struct Stapler<'a, R: ToolRunner> {
    runner: R,
    sleeper: &'a dyn Sleeper,
}

impl<'a, R: ToolRunner> Stapler<'a, R> {
    pub fn new(runner: R, sleeper: &'a dyn Sleeper) -> Self {
        Self { runner, sleeper }
    }

    /// Staple the ticket for an entity at a given filesystem path.
    ///
    /// Transient `stapler` failures are retried after a pause. Other failures
    /// are returned immediately.
    pub fn staple(&self, path: &str) -> Result<(), NotarizeError> {
        let argv = ["xcrun", "stapler", "staple", "--verbose", path]
            .iter()
            .map(|x| x.to_string())
            .collect::<Vec<_>>();

        let mut retry = Retry::new(format!("staple {}", path), true, self.sleeper);

        retry.run(
            || {
                warn!("stapling {}", path);
                let output = self.runner.run(&argv)?;

                for line in String::from_utf8_lossy(&output).lines() {
                    info!("stapler> {}", line);
                }

                Ok(())
            },
            is_transient_staple_error,
        )
    }

    /// Staple every `.app` and `.xpc` part under `base_path`.
    ///
    /// Nested bundles are stapled before the bundles containing them. Stops
    /// at the first failure.
    pub fn staple_bundled_parts(
        &self,
        parts: &[BundlePart],
        base_path: &str,
    ) -> Result<(), NotarizeError> {
        for path in staple_order(parts) {
            self.staple(&format!("{}/{}", base_path, path))?;
        }

        Ok(())
    }
}
