// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Apple notarization and stapling driven through Apple's tools.
//!
//! This crate submits signed artifacts to Apple's notary service with
//! `xcrun notarytool`, waits for the service to accept or reject them, and
//! staples the resulting tickets with `xcrun stapler`.
//!
//! # Features and Capabilities
//!
//! * Submit artifacts without waiting and obtain a [SubmissionId]. (See
//!   [Notary::submit()].)
//! * Wait on any number of submissions at once, with exponential backoff
//!   between polls and a bounded overall wait. Accepted submissions are
//!   reported as they arrive. (See [WaitForResults].)
//! * Fetch the processing log of rejected submissions.
//! * Staple tickets to bundles, nested bundles first, retrying the failures
//!   `stapler` is known to recover from. (See [Stapler].)
//! * Combine all of the above, governed by a [NotarizeAndStapleLevel]. (See
//!   [Notarizer].)
//!
//! Credentials are passed to `notarytool` untouched. Producing signed
//! artifacts and deciding which parts of a bundle to staple are left to
//! callers.
//!
//! # Getting Started
//!
//! Tools are run through the [ToolRunner] trait and all waits go through the
//! [Sleeper] trait. [CommandRunner] and [ThreadSleeper] are the real
//! implementations:
//!
//! ```no_run
//! use apple_notarize::{
//!     CommandRunner, NotarizationConfig, NotaryCredentials, Notarizer, ThreadSleeper,
//! };
//!
//! let mut config = NotarizationConfig::default();
//! config.set_credentials(NotaryCredentials::KeychainProfile("notary".into()));
//!
//! let runner = CommandRunner::new();
//! let notarizer = Notarizer::new(&runner, &config, &ThreadSleeper);
//! notarizer.notarize_paths(&["Product.dmg", "Product.pkg"])?;
//! # Ok::<(), apple_notarize::NotarizeError>(())
//! ```

pub mod command;
pub use command::{CommandRunner, ToolRunner};
pub mod config;
pub use config::{NotarizationConfig, NotarizeAndStapleLevel, NotaryCredentials};
mod error;
pub use error::*;
pub mod notary;
pub use notary::{NotarizationResult, Notary, Status, SubmissionId};
pub mod pipeline;
pub use pipeline::Notarizer;
pub mod retry;
pub use retry::Retry;
pub mod sleep;
pub use sleep::{Sleeper, ThreadSleeper};
pub mod stapling;
pub use stapling::{BundlePart, Stapler};
#[cfg(test)]
mod testutil;
pub mod wait;
pub use wait::{wait_for_results, WaitForResults};
