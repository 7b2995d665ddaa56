// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! High-level notarization of artifacts.

A [Notarizer] submits artifacts, waits on the notary, and staples tickets,
carrying each step only as far as its [NotarizeAndStapleLevel] allows.
*/

use {
    crate::{
        command::ToolRunner,
        config::{NotarizationConfig, NotarizeAndStapleLevel},
        notary::{Notary, SubmissionId},
        sleep::Sleeper,
        stapling::{BundlePart, Stapler},
        wait::WaitForResults,
        NotarizeError,
    },
    log::warn,
    std::collections::HashMap,
};

/// An entity for performing notarizations.
pub struct Notarizer<'a, R: ToolRunner> {
    notary: Notary<&'a R>,
    stapler: Stapler<'a, &'a R>,
    sleeper: &'a dyn Sleeper,
    level: NotarizeAndStapleLevel,
}

impl<'a, R: ToolRunner> Notarizer<'a, R> {
    pub fn new(runner: &'a R, config: &NotarizationConfig, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            notary: Notary::new(runner, config.notary_tool_args()),
            stapler: Stapler::new(runner, sleeper),
            sleeper,
            level: config.level(),
        }
    }

    pub fn notary(&self) -> &Notary<&'a R> {
        &self.notary
    }

    pub fn stapler(&self) -> &Stapler<'a, &'a R> {
        &self.stapler
    }

    pub fn level(&self) -> NotarizeAndStapleLevel {
        self.level
    }

    /// Wait on submissions.
    pub fn wait(
        &self,
        ids: impl IntoIterator<Item = SubmissionId>,
    ) -> Result<WaitForResults<'_, &'a R>, NotarizeError> {
        WaitForResults::new(&self.notary, ids, self.sleeper)
    }

    /// Notarize artifacts at the given paths.
    ///
    /// All artifacts are submitted before any is waited on. With
    /// [NotarizeAndStapleLevel::Staple], each artifact is stapled as soon as
    /// it is accepted.
    ///
    /// Returns the submission IDs: in submission order if results were not
    /// waited on, otherwise in the order they were accepted.
    pub fn notarize_paths(
        &self,
        paths: &[impl AsRef<str>],
    ) -> Result<Vec<SubmissionId>, NotarizeError> {
        if !self.level.should_notarize() || paths.is_empty() {
            warn!("notarization disabled; not submitting anything");
            return Ok(vec![]);
        }

        let mut submitted = HashMap::new();
        let mut ids = vec![];
        for path in paths {
            let path = path.as_ref();
            let id = self.notary.submit(path)?;
            submitted.insert(id.clone(), path);
            ids.push(id);
        }

        if !self.level.should_wait() {
            return Ok(ids);
        }

        let mut accepted = vec![];
        for id in self.wait(ids)? {
            let id = id?;

            if self.level.should_staple() {
                if let Some(path) = submitted.get(&id) {
                    self.stapler.staple(path)?;
                }
            }

            accepted.push(id);
        }

        Ok(accepted)
    }

    /// Notarize an artifact and staple bundled parts once it is accepted.
    ///
    /// `artifact` is what gets uploaded (e.g. a zip of an application). The
    /// tickets are stapled to `parts` under `base_path`.
    ///
    /// Returns `None` if notarization is disabled.
    pub fn notarize_and_staple_parts(
        &self,
        artifact: &str,
        parts: &[BundlePart],
        base_path: &str,
    ) -> Result<Option<SubmissionId>, NotarizeError> {
        if !self.level.should_notarize() {
            warn!("notarization disabled; not submitting {}", artifact);
            return Ok(None);
        }

        let id = self.notary.submit(artifact)?;

        if !self.level.should_wait() {
            return Ok(Some(id));
        }

        for accepted in self.wait(std::iter::once(id.clone()))? {
            accepted?;
        }

        if self.level.should_staple() {
            self.stapler.staple_bundled_parts(parts, base_path)?;
        }

        Ok(Some(id))
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::{
            config::NotaryCredentials,
            testutil::{plist_with, FakeRunner, RecordingSleeper},
        },
    };

    fn config(level: NotarizeAndStapleLevel) -> NotarizationConfig {
        let mut config = NotarizationConfig::default();
        config
            .set_credentials(NotaryCredentials::KeychainProfile("notary".into()))
            .set_level(level);

        config
    }

    fn submit_two(runner: &FakeRunner) {
        runner.push_submit(plist_with("id", "dmg-id"));
        runner.push_submit(plist_with("id", "pkg-id"));
    }

    const PATHS: [&str; 2] = ["/o/Product.dmg", "/o/Product.pkg"];

    #[test]
    fn level_none_submits_nothing() -> Result<(), NotarizeError> {
        let runner = FakeRunner::default();
        let sleeper = RecordingSleeper::default();

        let notarizer = Notarizer::new(&runner, &config(NotarizeAndStapleLevel::None), &sleeper);

        assert!(notarizer.notarize_paths(&PATHS)?.is_empty());
        assert!(notarizer
            .notarize_and_staple_parts("/w/App.zip", &[], "/w")?
            .is_none());
        assert!(runner.calls().is_empty());

        Ok(())
    }

    #[test]
    fn level_nowait_only_submits() -> Result<(), NotarizeError> {
        let runner = FakeRunner::default();
        submit_two(&runner);
        let sleeper = RecordingSleeper::default();

        let notarizer =
            Notarizer::new(&runner, &config(NotarizeAndStapleLevel::NoWait), &sleeper);

        let ids = notarizer.notarize_paths(&PATHS)?;

        assert_eq!(ids, vec![SubmissionId::from("dmg-id"), SubmissionId::from("pkg-id")]);
        assert_eq!(runner.calls().len(), 2);
        assert_eq!(runner.calls()[0][7..], ["--keychain-profile", "notary"]);

        Ok(())
    }

    #[test]
    fn level_wait_nostaple_does_not_staple() -> Result<(), NotarizeError> {
        let runner = FakeRunner::default();
        submit_two(&runner);
        runner.push_info("dmg-id", "Accepted");
        runner.push_info("pkg-id", "Accepted");
        let sleeper = RecordingSleeper::default();

        let notarizer = Notarizer::new(
            &runner,
            &config(NotarizeAndStapleLevel::WaitNoStaple),
            &sleeper,
        );

        assert_eq!(notarizer.notarize_paths(&PATHS)?.len(), 2);
        assert!(runner.calls_for("stapler").is_empty());

        Ok(())
    }

    #[test]
    fn level_staple_staples_in_acceptance_order() -> Result<(), NotarizeError> {
        let runner = FakeRunner::default();
        submit_two(&runner);
        runner.push_info("dmg-id", "In Progress");
        runner.push_info("pkg-id", "Accepted");
        runner.push_info("dmg-id", "Accepted");
        runner.push_staple("/o/Product.pkg", 0);
        runner.push_staple("/o/Product.dmg", 0);
        let sleeper = RecordingSleeper::default();

        let notarizer = Notarizer::new(&runner, &config(NotarizeAndStapleLevel::Staple), &sleeper);

        let ids = notarizer.notarize_paths(&PATHS)?;

        assert_eq!(ids, vec![SubmissionId::from("pkg-id"), SubmissionId::from("dmg-id")]);

        let stapled = runner
            .calls_for("stapler")
            .into_iter()
            .map(|argv| argv[4].clone())
            .collect::<Vec<_>>();
        assert_eq!(stapled, vec!["/o/Product.pkg", "/o/Product.dmg"]);

        Ok(())
    }

    #[test]
    fn rejection_prevents_stapling() {
        let runner = FakeRunner::default();
        runner.push_submit(plist_with("id", "app-id"));
        runner.push_info("app-id", "Invalid");
        runner.push_log("app-id", Ok(b"{}".to_vec()));
        let sleeper = RecordingSleeper::default();

        let notarizer = Notarizer::new(&runner, &config(NotarizeAndStapleLevel::Staple), &sleeper);

        let res = notarizer.notarize_and_staple_parts("/w/App.zip", &[BundlePart::new("App.app")], "/w");

        assert!(matches!(res, Err(NotarizeError::SubmissionFailed { .. })));
        assert!(runner.calls_for("stapler").is_empty());
    }

    #[test]
    fn parts_stapled_after_acceptance() -> Result<(), NotarizeError> {
        let runner = FakeRunner::default();
        runner.push_submit(plist_with("id", "app-id"));
        runner.push_info("app-id", "Accepted");
        runner.push_staple("/w/App.app/Contents/Helpers/Helper.app", 0);
        runner.push_staple("/w/App.app", 0);
        let sleeper = RecordingSleeper::default();

        let notarizer = Notarizer::new(&runner, &config(NotarizeAndStapleLevel::Staple), &sleeper);

        let id = notarizer.notarize_and_staple_parts(
            "/w/App.zip",
            &[
                BundlePart::new("App.app"),
                BundlePart::new("App.app/Contents/Helpers/Helper.app"),
            ],
            "/w",
        )?;

        assert_eq!(id, Some(SubmissionId::from("app-id")));
        assert_eq!(runner.calls_for("stapler").len(), 2);

        Ok(())
    }
}
