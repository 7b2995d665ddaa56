// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::{command::ToolRunner, sleep::Sleeper, NotarizeError, ToolError},
    indoc::formatdoc,
    std::{
        cell::RefCell,
        collections::{HashMap, VecDeque},
        time::Duration,
    },
};

type Reply = Result<Vec<u8>, NotarizeError>;

/// Produce `notarytool` style plist output holding a single string.
pub fn plist_with(key: &str, value: &str) -> Reply {
    Ok(formatdoc! {r#"
        <?xml version="1.0" encoding="UTF-8"?>
        <!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
        <plist version="1.0">
        <dict>
        	<key>{key}</key>
        	<string>{value}</string>
        	<key>message</key>
        	<string>Successfully received submission info</string>
        </dict>
        </plist>
        "#,
        key = key,
        value = value,
    }
    .into_bytes())
}

/// A [ToolRunner] replying from scripted queues and recording invocations.
///
/// Replies are keyed by `submit`, `info:<id>`, `log:<id>`, and
/// `staple:<path>`. Running out of replies is an error.
#[derive(Default)]
pub struct FakeRunner {
    replies: RefCell<HashMap<String, VecDeque<Reply>>>,
    calls: RefCell<Vec<Vec<String>>>,
}

impl FakeRunner {
    pub fn tool_error(code: i32) -> NotarizeError {
        NotarizeError::Tool(ToolError {
            argv: vec!["xcrun".into()],
            exit_code: Some(code),
            output: format!("exit {}", code),
        })
    }

    fn push(&self, key: String, reply: Reply) {
        self.replies
            .borrow_mut()
            .entry(key)
            .or_default()
            .push_back(reply);
    }

    pub fn push_submit(&self, reply: Reply) {
        self.push("submit".into(), reply);
    }

    pub fn push_info(&self, id: &str, status: &str) {
        self.push_info_raw(id, plist_with("status", status));
    }

    pub fn push_info_raw(&self, id: &str, reply: Reply) {
        self.push(format!("info:{}", id), reply);
    }

    pub fn push_log(&self, id: &str, reply: Reply) {
        self.push(format!("log:{}", id), reply);
    }

    pub fn push_staple(&self, path: &str, exit_code: i32) {
        let reply = if exit_code == 0 {
            Ok(b"The staple and validate action worked!".to_vec())
        } else {
            Err(Self::tool_error(exit_code))
        };

        self.push(format!("staple:{}", path), reply);
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }

    /// Invocations whose argv contains `verb`.
    pub fn calls_for(&self, verb: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|argv| argv.iter().any(|x| x == verb))
            .collect()
    }

    fn key(argv: &[String]) -> String {
        let arg = |i: usize| argv.get(i).map(|x| x.as_str()).unwrap_or_default();

        match (arg(1), arg(2)) {
            ("notarytool", "submit") => "submit".to_string(),
            ("notarytool", verb) => format!("{}:{}", verb, arg(3)),
            ("stapler", _) => format!("staple:{}", arg(4)),
            _ => argv.join(" "),
        }
    }
}

impl ToolRunner for FakeRunner {
    fn run(&self, argv: &[String]) -> Result<Vec<u8>, NotarizeError> {
        self.calls.borrow_mut().push(argv.to_vec());

        let key = Self::key(argv);

        self.replies
            .borrow_mut()
            .get_mut(&key)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| {
                Err(NotarizeError::CliGeneralError(format!(
                    "unexpected invocation: {}",
                    argv.join(" ")
                )))
            })
    }
}

/// A [Sleeper] that records requested durations without blocking.
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    pub fn total(&self) -> Duration {
        self.sleeps.borrow().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}
