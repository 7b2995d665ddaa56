// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Settings controlling how notarization is performed. */

use {
    crate::NotarizeError,
    std::{fmt::Display, path::PathBuf, str::FromStr},
};

/// How far to carry notarization for submitted artifacts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NotarizeAndStapleLevel {
    /// Do not submit anything.
    None,
    /// Submit and return without waiting on results.
    NoWait,
    /// Submit and wait for results, but do not staple.
    WaitNoStaple,
    /// Submit, wait for results, and staple tickets.
    Staple,
}

impl Default for NotarizeAndStapleLevel {
    fn default() -> Self {
        Self::Staple
    }
}

impl NotarizeAndStapleLevel {
    pub fn all() -> &'static [&'static str] {
        &["none", "nowait", "wait-nostaple", "staple"]
    }

    pub fn should_notarize(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn should_wait(&self) -> bool {
        matches!(self, Self::WaitNoStaple | Self::Staple)
    }

    pub fn should_staple(&self) -> bool {
        matches!(self, Self::Staple)
    }
}

impl Display for NotarizeAndStapleLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::NoWait => "nowait",
            Self::WaitNoStaple => "wait-nostaple",
            Self::Staple => "staple",
        })
    }
}

impl FromStr for NotarizeAndStapleLevel {
    type Err = NotarizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "nowait" => Ok(Self::NoWait),
            "wait-nostaple" => Ok(Self::WaitNoStaple),
            "staple" => Ok(Self::Staple),
            _ => Err(NotarizeError::CliGeneralError(format!(
                "unknown notarization level: {}",
                s
            ))),
        }
    }
}

/// Credentials for authenticating to the notary service.
///
/// These are passed through to `notarytool` and never interpreted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NotaryCredentials {
    /// A profile previously stored with `notarytool store-credentials`.
    KeychainProfile(String),

    /// An Apple ID with an app-specific password.
    AppleId {
        apple_id: String,
        password: String,
        team_id: String,
    },

    /// An App Store Connect API key.
    ApiKey {
        key_path: PathBuf,
        key_id: String,
        issuer: Option<String>,
    },
}

impl NotaryCredentials {
    /// Derive `notarytool` arguments for these credentials.
    pub fn arguments(&self) -> Vec<String> {
        match self {
            Self::KeychainProfile(profile) => {
                vec!["--keychain-profile".into(), profile.clone()]
            }
            Self::AppleId {
                apple_id,
                password,
                team_id,
            } => vec![
                "--apple-id".into(),
                apple_id.clone(),
                "--password".into(),
                password.clone(),
                "--team-id".into(),
                team_id.clone(),
            ],
            Self::ApiKey {
                key_path,
                key_id,
                issuer,
            } => {
                let mut args = vec![
                    "--key".into(),
                    format!("{}", key_path.display()),
                    "--key-id".into(),
                    key_id.clone(),
                ];

                if let Some(issuer) = issuer {
                    args.push("--issuer".into());
                    args.push(issuer.clone());
                }

                args
            }
        }
    }
}

/// Describes how to reach the notary service and what to do with submissions.
#[derive(Clone, Debug, Default)]
pub struct NotarizationConfig {
    credentials: Option<NotaryCredentials>,
    extra_args: Vec<String>,
    level: NotarizeAndStapleLevel,
}

impl NotarizationConfig {
    pub fn credentials(&self) -> Option<&NotaryCredentials> {
        self.credentials.as_ref()
    }

    pub fn set_credentials(&mut self, credentials: NotaryCredentials) -> &mut Self {
        self.credentials = Some(credentials);
        self
    }

    /// Append opaque arguments to every `notarytool` invocation.
    pub fn extra_args(&mut self, args: impl Iterator<Item = impl ToString>) -> &mut Self {
        self.extra_args.extend(args.map(|x| x.to_string()));
        self
    }

    pub fn level(&self) -> NotarizeAndStapleLevel {
        self.level
    }

    pub fn set_level(&mut self, level: NotarizeAndStapleLevel) -> &mut Self {
        self.level = level;
        self
    }

    /// Arguments appended to every `notarytool` invocation.
    pub fn notary_tool_args(&self) -> Vec<String> {
        let mut args = self
            .credentials
            .as_ref()
            .map(|c| c.arguments())
            .unwrap_or_default();

        args.extend(self.extra_args.iter().cloned());

        args
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn level_round_trips_names() -> Result<(), NotarizeError> {
        for name in NotarizeAndStapleLevel::all() {
            assert_eq!(NotarizeAndStapleLevel::from_str(name)?.to_string(), *name);
        }

        assert!(NotarizeAndStapleLevel::from_str("bogus").is_err());

        Ok(())
    }

    #[test]
    fn level_predicates() {
        use NotarizeAndStapleLevel::*;

        assert!(!None.should_notarize());
        assert!(NoWait.should_notarize() && !NoWait.should_wait());
        assert!(WaitNoStaple.should_wait() && !WaitNoStaple.should_staple());
        assert!(Staple.should_wait() && Staple.should_staple());
        assert_eq!(NotarizeAndStapleLevel::default(), Staple);
    }

    #[test]
    fn tool_args_from_apple_id() {
        let mut config = NotarizationConfig::default();
        config
            .set_credentials(NotaryCredentials::AppleId {
                apple_id: "dev@example.com".into(),
                password: "hunter2".into(),
                team_id: "TEAM".into(),
            })
            .extra_args(["--timeout", "1h"].iter());

        assert_eq!(
            config.notary_tool_args(),
            vec![
                "--apple-id",
                "dev@example.com",
                "--password",
                "hunter2",
                "--team-id",
                "TEAM",
                "--timeout",
                "1h"
            ]
        );
    }

    #[test]
    fn tool_args_from_api_key() {
        let creds = NotaryCredentials::ApiKey {
            key_path: PathBuf::from("/keys/AuthKey.p8"),
            key_id: "DEADBEEF42".into(),
            issuer: None,
        };

        assert_eq!(
            creds.arguments(),
            vec!["--key", "/keys/AuthKey.p8", "--key-id", "DEADBEEF42"]
        );
    }

    #[test]
    fn tool_args_default_empty() {
        assert!(NotarizationConfig::default().notary_tool_args().is_empty());
    }
}
