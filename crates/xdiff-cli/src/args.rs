//! Command line and config file handling

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::time::Duration;
use xdiff_core::DifferConfig;

pub(crate) fn command() -> Command {
    Command::new("xdiff")
        .version(xdiff_core::VERSION)
        .about("Re-verify suspected divergent keys between two replicated buckets")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug-level logging"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Only log errors"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(with_config_args(
            Command::new("run").about("Fetch every candidate key from both clusters and write the diff"),
        ))
        .subcommand(with_config_args(
            Command::new("check-config").about("Validate and print the effective configuration"),
        ))
}

const ENDPOINT_ARGS: [(&str, &str); 8] = [
    ("source-url", "source cluster URL"),
    ("source-bucket", "source bucket name"),
    ("source-username", "source user name"),
    ("source-password", "source password"),
    ("target-url", "target cluster URL"),
    ("target-bucket", "target bucket name"),
    ("target-username", "target user name"),
    ("target-password", "target password"),
];

fn with_config_args(command: Command) -> Command {
    let command = command.arg(
        Arg::new("config")
            .long("config")
            .short('c')
            .value_parser(value_parser!(PathBuf))
            .help("TOML configuration file"),
    );
    let command = ENDPOINT_ARGS
        .into_iter()
        .fold(command, |command, (id, help)| command.arg(Arg::new(id).long(id).help(help)));
    command
        .arg(
            Arg::new("diff-dir")
                .long("diff-dir")
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding the key list and receiving results"),
        )
        .arg(Arg::new("input-keys").long("input-keys").help("Key list file name"))
        .arg(Arg::new("output-keys").long("output-keys").help("Diff-keys output file name"))
        .arg(
            Arg::new("workers")
                .long("workers")
                .value_parser(value_parser!(usize))
                .help("Number of concurrent workers"),
        )
        .arg(
            Arg::new("batch-size")
                .long("batch-size")
                .value_parser(value_parser!(usize))
                .help("Keys per batch"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_parser(value_parser!(u64))
                .help("Per-batch timeout in seconds"),
        )
        .arg(
            Arg::new("max-retries")
                .long("max-retries")
                .value_parser(value_parser!(u32))
                .help("Retries per batch after its first send"),
        )
        .arg(
            Arg::new("retry-interval-ms")
                .long("retry-interval-ms")
                .value_parser(value_parser!(u64))
                .help("Delay before the first retry"),
        )
        .arg(
            Arg::new("max-backoff-ms")
                .long("max-backoff-ms")
                .value_parser(value_parser!(u64))
                .help("Upper bound for the retry delay"),
        )
        .arg(
            Arg::new("report-interval-ms")
                .long("report-interval-ms")
                .value_parser(value_parser!(u64))
                .help("Interval between progress reports"),
        )
}

/// Read a TOML config file; no file means defaults
pub(crate) fn load_config(path: Option<&Path>) -> anyhow::Result<DifferConfig> {
    let Some(path) = path else {
        return Ok(DifferConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse config file {}", path.display()))
}

/// Config file, then command-line overrides
pub(crate) fn resolve_config(args: &ArgMatches) -> anyhow::Result<DifferConfig> {
    let path = args.get_one::<PathBuf>("config");
    let mut config = load_config(path.map(PathBuf::as_path))?;
    apply_overrides(&mut config, args);
    Ok(config)
}

pub(crate) fn apply_overrides(config: &mut DifferConfig, args: &ArgMatches) {
    let endpoint_slots = [
        &mut config.source.url,
        &mut config.source.bucket,
        &mut config.source.username,
        &mut config.source.password,
        &mut config.target.url,
        &mut config.target.bucket,
        &mut config.target.username,
        &mut config.target.password,
    ];
    for ((id, _), slot) in ENDPOINT_ARGS.into_iter().zip(endpoint_slots) {
        if let Some(value) = args.get_one::<String>(id) {
            slot.clone_from(value);
        }
    }

    if let Some(dir) = args.get_one::<PathBuf>("diff-dir") {
        config.diff_file_dir.clone_from(dir);
    }
    if let Some(name) = args.get_one::<String>("input-keys") {
        config.input_diff_keys_file.clone_from(name);
    }
    if let Some(name) = args.get_one::<String>("output-keys") {
        config.output_diff_keys_file.clone_from(name);
    }
    if let Some(&workers) = args.get_one::<usize>("workers") {
        config.num_workers = workers;
    }
    if let Some(&batch_size) = args.get_one::<usize>("batch-size") {
        config.batch_size = batch_size;
    }
    if let Some(&timeout) = args.get_one::<u64>("timeout") {
        config.timeout_secs = timeout;
    }
    if let Some(&retries) = args.get_one::<u32>("max-retries") {
        config.max_send_batch_retries = retries;
    }
    if let Some(&ms) = args.get_one::<u64>("retry-interval-ms") {
        config.send_batch_retry_interval = Duration::from_millis(ms);
    }
    if let Some(&ms) = args.get_one::<u64>("max-backoff-ms") {
        config.send_batch_max_backoff = Duration::from_millis(ms);
    }
    if let Some(&ms) = args.get_one::<u64>("report-interval-ms") {
        config.report_interval = Duration::from_millis(ms);
    }
}
