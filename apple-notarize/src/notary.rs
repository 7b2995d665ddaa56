// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Talking to Apple's notary service through `notarytool`.

Notarization works by uploading a signed artifact to Apple and waiting for
Apple to scan it. This module turns the `submit`, `info`, and `log` verbs of
`xcrun notarytool` into Rust calls and interprets their plist output.
*/

use {
    crate::{command::ToolRunner, NotarizeError},
    log::{error, info},
    std::{fmt::Display, io::Cursor},
};

/// Status string the notary reports while a submission is being processed.
pub const STATUS_IN_PROGRESS: &str = "In Progress";

/// Status string the notary reports for a successful submission.
pub const STATUS_ACCEPTED: &str = "Accepted";

/// Identifies a submission to the notary service.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SubmissionId(String);

impl SubmissionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SubmissionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for SubmissionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SubmissionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Coarse state of a submission.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    InProgress,
    Success,
    Error,
}

impl Status {
    /// Classify a status string reported by the notary.
    ///
    /// Anything not known to be in progress or accepted is an error.
    pub fn from_service_str(s: &str) -> Self {
        match s {
            STATUS_IN_PROGRESS => Self::InProgress,
            STATUS_ACCEPTED => Self::Success,
            _ => Self::Error,
        }
    }
}

/// The outcome of querying a submission.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NotarizationResult {
    InProgress,

    Success {
        status: String,
        output: String,
    },

    Error {
        status: String,
        output: String,
        /// Processing log, if it could be retrieved.
        log: Option<String>,
    },
}

impl NotarizationResult {
    pub fn status(&self) -> Status {
        match self {
            Self::InProgress => Status::InProgress,
            Self::Success { .. } => Status::Success,
            Self::Error { .. } => Status::Error,
        }
    }
}

/// Parse `notarytool --output-format plist` output into a dictionary.
pub fn parse_plist_dictionary(data: &[u8]) -> Result<plist::Dictionary, NotarizeError> {
    let value =
        plist::Value::from_reader(Cursor::new(data)).map_err(NotarizeError::PlistParse)?;

    value
        .into_dictionary()
        .ok_or(NotarizeError::PlistNotDictionary)
}

/// Invokes `notarytool` verbs.
///
/// Authentication and other arguments are captured at construction and
/// appended to every invocation.
pub struct Notary<R: ToolRunner> {
    runner: R,
    tool_args: Vec<String>,
}

impl<R: ToolRunner> Notary<R> {
    pub fn new(runner: R, tool_args: Vec<String>) -> Self {
        Self { runner, tool_args }
    }

    fn notarytool_argv(&self, args: &[&str]) -> Vec<String> {
        ["xcrun", "notarytool"]
            .iter()
            .chain(args.iter())
            .map(|x| x.to_string())
            .chain(self.tool_args.iter().cloned())
            .collect()
    }

    /// Submit an artifact for notarization without waiting for the result.
    pub fn submit(&self, path: &str) -> Result<SubmissionId, NotarizeError> {
        let argv = self.notarytool_argv(&[
            "submit",
            path,
            "--no-wait",
            "--output-format",
            "plist",
        ]);

        let output = self.runner.run(&argv)?;
        let plist = parse_plist_dictionary(&output)?;

        let id = plist
            .get("id")
            .and_then(|v| v.as_string())
            .ok_or(NotarizeError::SubmissionMissingId)?;

        info!("submitted {} for notarization as {}", path, id);

        Ok(SubmissionId::from(id))
    }

    /// Query the state of a submission.
    ///
    /// Rejected submissions have their processing log fetched. Failure to
    /// fetch the log is logged and otherwise ignored.
    pub fn query(&self, id: &SubmissionId) -> Result<NotarizationResult, NotarizeError> {
        let argv = self.notarytool_argv(&["info", id.as_str(), "--output-format", "plist"]);

        let output = self.runner.run(&argv)?;
        let plist = parse_plist_dictionary(&output)?;

        let status = plist
            .get("status")
            .and_then(|v| v.as_string())
            .ok_or_else(|| NotarizeError::QueryMissingStatus(id.clone()))?
            .to_string();
        let output = String::from_utf8_lossy(&output).to_string();

        Ok(match Status::from_service_str(&status) {
            Status::InProgress => NotarizationResult::InProgress,
            Status::Success => NotarizationResult::Success { status, output },
            Status::Error => {
                let log = match self.log(id) {
                    Ok(log) => Some(log),
                    Err(e) => {
                        error!("failed to retrieve notarization log for {}: {}", id, e);
                        None
                    }
                };

                NotarizationResult::Error {
                    status,
                    output,
                    log,
                }
            }
        })
    }

    /// Retrieve the processing log for a submission.
    pub fn log(&self, id: &SubmissionId) -> Result<String, NotarizeError> {
        let argv = self.notarytool_argv(&["log", id.as_str()]);

        let output = self.runner.run(&argv)?;

        Ok(String::from_utf8_lossy(&output).to_string())
    }
}
