// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Execution of external tools (`xcrun notarytool`, `xcrun stapler`). */

use {
    crate::{NotarizeError, ToolError},
    log::{debug, warn},
    std::path::PathBuf,
};

/// Environment variable overriding the `xcrun` executable to run.
pub const XCRUN_PATH_ENV_VARIABLE: &str = "APPLE_NOTARIZE_XCRUN_EXE";

/// The program name argument vectors for Apple's developer tools start with.
pub const XCRUN: &str = "xcrun";

/// Runs an argument vector to completion.
pub trait ToolRunner {
    /// Execute `argv` and return its standard output.
    ///
    /// A non-zero exit must be reported as [NotarizeError::Tool].
    fn run(&self, argv: &[String]) -> Result<Vec<u8>, NotarizeError>;
}

impl<T: ToolRunner + ?Sized> ToolRunner for &T {
    fn run(&self, argv: &[String]) -> Result<Vec<u8>, NotarizeError> {
        (**self).run(argv)
    }
}

/// Find the `xcrun` executable to use.
///
/// Honors [XCRUN_PATH_ENV_VARIABLE] and otherwise defers to `PATH` lookup.
pub fn find_xcrun_exe() -> PathBuf {
    if let Some(path) = std::env::var_os(XCRUN_PATH_ENV_VARIABLE) {
        PathBuf::from(path)
    } else {
        PathBuf::from(XCRUN)
    }
}

/// A [ToolRunner] spawning real processes.
#[derive(Clone, Debug)]
pub struct CommandRunner {
    xcrun_exe: PathBuf,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner {
    pub fn new() -> Self {
        Self::with_xcrun(find_xcrun_exe())
    }

    /// Construct an instance running `path` in place of `xcrun`.
    pub fn with_xcrun(path: impl Into<PathBuf>) -> Self {
        Self {
            xcrun_exe: path.into(),
        }
    }
}

impl ToolRunner for CommandRunner {
    fn run(&self, argv: &[String]) -> Result<Vec<u8>, NotarizeError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| NotarizeError::CliGeneralError("empty argument vector".into()))?;

        let program = if program == XCRUN {
            self.xcrun_exe.clone()
        } else {
            PathBuf::from(program)
        };

        debug!("invoking {} with args: {:?}", program.display(), args);

        let output = duct::cmd(&program, args)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()?;

        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            for line in stderr.lines() {
                debug!("{}> {}", argv.join(" "), line);
            }

            Ok(output.stdout)
        } else {
            let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
            combined.push_str(&stderr);

            warn!(
                "{} failed with status {}",
                argv.join(" "),
                output.status
            );

            Err(NotarizeError::Tool(ToolError {
                argv: argv.to_vec(),
                exit_code: output.status.code(),
                output: combined,
            }))
        }
    }
}
