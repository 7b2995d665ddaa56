// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {crate::notary::SubmissionId, std::fmt::Display, thiserror::Error};

/// Describes an external tool process that did not exit successfully.
#[derive(Clone, Debug)]
pub struct ToolError {
    /// The argument vector that was executed.
    pub argv: Vec<String>,

    /// Exit code of the process.
    ///
    /// `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,

    /// Captured stdout and stderr of the process.
    pub output: String,
}

impl ToolError {
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }
}

impl Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "{} exited with code {}", self.argv.join(" "), code),
            None => write!(f, "{} terminated by signal", self.argv.join(" ")),
        }
    }
}

/// Unified error type for notarization and stapling.
#[derive(Debug, Error)]
pub enum NotarizeError {
    #[error("unknown command")]
    CliUnknownCommand,

    #[error("bad argument")]
    CliBadArgument,

    #[error("{0}")]
    CliGeneralError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tool error: {0}")]
    Tool(ToolError),

    #[error("error parsing notarytool plist output: {0}")]
    PlistParse(plist::Error),

    #[error("notarytool plist output is not a dictionary")]
    PlistNotDictionary,

    #[error("notarytool submit output does not contain an id")]
    SubmissionMissingId,

    #[error("notarytool info output for {0} does not contain a status")]
    QueryMissingStatus(SubmissionId),

    #[error("notarization failed for {id}: {status}")]
    SubmissionFailed { id: SubmissionId, status: String },

    #[error("timed out waiting for notarization results: {}", format_ids(.0))]
    WaitTimeout(Vec<SubmissionId>),

    #[error("no submissions to wait on")]
    NoSubmissions,

    #[error("retry loop for {0} should have terminated")]
    RetryPolicyMisuse(String),
}

impl NotarizeError {
    /// Whether this error reports a failure of the notarization itself.
    ///
    /// Tool, I/O, and programming errors are not notarization failures.
    pub fn is_notarization_failure(&self) -> bool {
        matches!(
            self,
            Self::PlistParse(_)
                | Self::PlistNotDictionary
                | Self::SubmissionMissingId
                | Self::QueryMissingStatus(_)
                | Self::SubmissionFailed { .. }
                | Self::WaitTimeout(_)
        )
    }

    /// Exit code of a failed tool process, if this is a tool error.
    pub fn tool_exit_code(&self) -> Option<i32> {
        match self {
            Self::Tool(err) => err.exit_code(),
            _ => None,
        }
    }
}

fn format_ids(ids: &[SubmissionId]) -> String {
    format!(
        "{{{}}}",
        ids.iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    )
}
