// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    apple_notarize::{
        BundlePart, CommandRunner, NotarizationConfig, NotarizeAndStapleLevel, NotarizeError,
        NotaryCredentials, Notarizer, Stapler, SubmissionId, ThreadSleeper,
    },
    clap::{Arg, ArgMatches, Command},
    log::LevelFilter,
    std::{path::PathBuf, str::FromStr},
};

const NOTARIZE_ABOUT: &str = "\
Submit artifacts for notarization, wait on results, and staple tickets.

All paths are submitted before any result is waited on. How far the process
is carried is controlled by --level:

none           do nothing
nowait         submit and print submission IDs
wait-nostaple  submit and wait for every submission to be accepted
staple         submit, wait, and staple each path once it is accepted

Waiting gives up after roughly an hour of polling.
";

const STAPLE_PARTS_ABOUT: &str = "\
Staple notarization tickets to the parts of a bundle.

Only parts ending in .app or .xpc are stapled. Parts are stapled in reverse
lexicographic order so nested bundles are stapled before the bundles
containing them. Part paths are relative to --base.
";

fn add_notary_args(app: Command) -> Command {
    app.arg(
        Arg::new("keychain_profile")
            .long("keychain-profile")
            .takes_value(true)
            .help("Name of credentials stored with `notarytool store-credentials`"),
    )
    .arg(
        Arg::new("apple_id")
            .long("apple-id")
            .takes_value(true)
            .requires_all(&["password", "team_id"])
            .help("Apple ID to authenticate as"),
    )
    .arg(
        Arg::new("password")
            .long("password")
            .takes_value(true)
            .help("App-specific password for the Apple ID"),
    )
    .arg(
        Arg::new("team_id")
            .long("team-id")
            .takes_value(true)
            .help("Developer team ID"),
    )
    .arg(
        Arg::new("api_key_path")
            .long("api-key-path")
            .takes_value(true)
            .allow_invalid_utf8(true)
            .requires("api_key_id")
            .help("Path to an App Store Connect API private key"),
    )
    .arg(
        Arg::new("api_key_id")
            .long("api-key-id")
            .takes_value(true)
            .help("ID of the App Store Connect API key"),
    )
    .arg(
        Arg::new("api_issuer")
            .long("api-issuer")
            .takes_value(true)
            .help("Issuer ID of the App Store Connect API key"),
    )
    .arg(
        Arg::new("notary_arg")
            .long("notary-arg")
            .takes_value(true)
            .multiple_occurrences(true)
            .allow_hyphen_values(true)
            .help("Extra argument to pass to every notarytool invocation"),
    )
}

fn notarization_config_from_args(args: &ArgMatches) -> Result<NotarizationConfig, NotarizeError> {
    let mut config = NotarizationConfig::default();

    if let Some(profile) = args.value_of("keychain_profile") {
        config.set_credentials(NotaryCredentials::KeychainProfile(profile.to_string()));
    } else if let Some(apple_id) = args.value_of("apple_id") {
        config.set_credentials(NotaryCredentials::AppleId {
            apple_id: apple_id.to_string(),
            password: args
                .value_of("password")
                .ok_or(NotarizeError::CliBadArgument)?
                .to_string(),
            team_id: args
                .value_of("team_id")
                .ok_or(NotarizeError::CliBadArgument)?
                .to_string(),
        });
    } else if let Some(key_path) = args.value_of_os("api_key_path") {
        config.set_credentials(NotaryCredentials::ApiKey {
            key_path: PathBuf::from(key_path),
            key_id: args
                .value_of("api_key_id")
                .ok_or(NotarizeError::CliBadArgument)?
                .to_string(),
            issuer: args.value_of("api_issuer").map(|x| x.to_string()),
        });
    }

    if let Some(values) = args.values_of("notary_arg") {
        config.extra_args(values);
    }

    Ok(config)
}

fn command_submit(args: &ArgMatches) -> Result<(), NotarizeError> {
    let path = args
        .value_of("path")
        .ok_or(NotarizeError::CliBadArgument)?;

    let config = notarization_config_from_args(args)?;
    let runner = CommandRunner::new();
    let notarizer = Notarizer::new(&runner, &config, &ThreadSleeper);

    let id = notarizer.notary().submit(path)?;
    println!("{}", id);

    Ok(())
}

fn command_wait(args: &ArgMatches) -> Result<(), NotarizeError> {
    let ids = args
        .values_of("id")
        .ok_or(NotarizeError::CliBadArgument)?
        .map(SubmissionId::from)
        .collect::<Vec<_>>();

    let config = notarization_config_from_args(args)?;
    let runner = CommandRunner::new();
    let notarizer = Notarizer::new(&runner, &config, &ThreadSleeper);

    for id in notarizer.wait(ids)? {
        println!("{}", id?);
    }

    Ok(())
}

fn command_log(args: &ArgMatches) -> Result<(), NotarizeError> {
    let id = SubmissionId::from(args.value_of("id").ok_or(NotarizeError::CliBadArgument)?);

    let config = notarization_config_from_args(args)?;
    let runner = CommandRunner::new();
    let notarizer = Notarizer::new(&runner, &config, &ThreadSleeper);

    print!("{}", notarizer.notary().log(&id)?);

    Ok(())
}

fn command_staple(args: &ArgMatches) -> Result<(), NotarizeError> {
    let path = args
        .value_of("path")
        .ok_or(NotarizeError::CliBadArgument)?;

    let stapler = Stapler::new(CommandRunner::new(), &ThreadSleeper);
    stapler.staple(path)?;

    Ok(())
}

fn command_staple_parts(args: &ArgMatches) -> Result<(), NotarizeError> {
    let base = args
        .value_of("base")
        .ok_or(NotarizeError::CliBadArgument)?;
    let parts = args
        .values_of("part")
        .ok_or(NotarizeError::CliBadArgument)?
        .map(BundlePart::new)
        .collect::<Vec<_>>();

    let stapler = Stapler::new(CommandRunner::new(), &ThreadSleeper);
    stapler.staple_bundled_parts(&parts, base)?;

    Ok(())
}

fn command_notarize(args: &ArgMatches) -> Result<(), NotarizeError> {
    let paths = args
        .values_of("path")
        .ok_or(NotarizeError::CliBadArgument)?
        .collect::<Vec<_>>();
    let level = NotarizeAndStapleLevel::from_str(
        args.value_of("level")
            .expect("argument should have default value"),
    )?;

    let mut config = notarization_config_from_args(args)?;
    config.set_level(level);

    let runner = CommandRunner::new();
    let notarizer = Notarizer::new(&runner, &config, &ThreadSleeper);

    for id in notarizer.notarize_paths(&paths)? {
        println!("{}", id);
    }

    Ok(())
}

fn main_impl() -> Result<(), NotarizeError> {
    let app = Command::new("Apple notarization driver")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Notarize and staple Apple software with notarytool and stapler")
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .multiple_occurrences(true)
                .help("Increase logging verbosity. Can be specified multiple times."),
        );

    let app = app.subcommand(add_notary_args(
        Command::new("log")
            .about("Print the processing log of a submission")
            .arg(
                Arg::new("id")
                    .required(true)
                    .help("Submission ID to fetch the log of"),
            ),
    ));

    let app = app.subcommand(add_notary_args(
        Command::new("notarize")
            .about("Submit, wait on, and staple artifacts")
            .long_about(NOTARIZE_ABOUT)
            .arg(
                Arg::new("level")
                    .long("level")
                    .takes_value(true)
                    .possible_values(NotarizeAndStapleLevel::all())
                    .default_value("staple")
                    .help("How far to carry notarization"),
            )
            .arg(
                Arg::new("path")
                    .required(true)
                    .multiple_values(true)
                    .help("Paths of artifacts to notarize"),
            ),
    ));

    let app = app.subcommand(
        Command::new("staple")
            .about("Staple a notarization ticket to an entity")
            .arg(
                Arg::new("path")
                    .required(true)
                    .help("Path to entity to staple"),
            ),
    );

    let app = app.subcommand(
        Command::new("staple-parts")
            .about("Staple notarization tickets to the parts of a bundle")
            .long_about(STAPLE_PARTS_ABOUT)
            .arg(
                Arg::new("base")
                    .long("base")
                    .takes_value(true)
                    .required(true)
                    .help("Directory part paths are relative to"),
            )
            .arg(
                Arg::new("part")
                    .required(true)
                    .multiple_values(true)
                    .help("Relative paths of bundle parts"),
            ),
    );

    let app = app.subcommand(add_notary_args(
        Command::new("submit")
            .about("Submit an artifact for notarization without waiting")
            .arg(
                Arg::new("path")
                    .required(true)
                    .help("Path of artifact to submit"),
            ),
    ));

    let app = app.subcommand(add_notary_args(
        Command::new("wait")
            .about("Wait on submissions and print each as it is accepted")
            .arg(
                Arg::new("id")
                    .required(true)
                    .multiple_values(true)
                    .help("Submission IDs to wait on"),
            ),
    ));

    let matches = app.get_matches();

    let log_level = match matches.occurrences_of("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    builder.init();

    match matches.subcommand() {
        Some(("log", args)) => command_log(args),
        Some(("notarize", args)) => command_notarize(args),
        Some(("staple", args)) => command_staple(args),
        Some(("staple-parts", args)) => command_staple_parts(args),
        Some(("submit", args)) => command_submit(args),
        Some(("wait", args)) => command_wait(args),
        _ => Err(NotarizeError::CliUnknownCommand),
    }
}

fn main() {
    let exit_code = match main_impl() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {}", err);
            1
        }
    };

    std::process::exit(exit_code)
}
