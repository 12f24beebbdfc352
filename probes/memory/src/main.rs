//! check_snmp_mem: remote memory check for Nagios-compatible supervisors.
//!
//! Queries a host's SNMP agent once, prints a single status line with
//! performance data and exits with the plugin status code.

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};
use snmpcheck_rs_core::{
    init_logging, CheckResult, GlobalConfig, ProbeError, SessionConfig, Status, Threshold, Thresholds,
};
use snmpcheck_rs_memory::check_host;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{debug, error};

/// Command-line arguments for the memory check.
///
/// Unset options fall back to the config file, then to built-in defaults.
#[derive(Parser, Debug)]
#[command(name = "check_snmp_mem")]
#[command(about = "Check real memory usage (used minus buffers/cache) of a remote host over SNMP")]
#[command(version)]
#[command(author)]
#[command(disable_help_flag = true)]
struct Args {
    /// Target host address
    #[arg(short = 'h', long)]
    host: Option<String>,

    /// SNMP agent UDP port [default: 161]
    #[arg(short, long)]
    port: Option<u16>,

    /// Community string [default: public]
    #[arg(short = 's', long)]
    community: Option<String>,

    /// Warning threshold, N (MB free) or N% (percent used) [default: 85%]
    #[arg(short, long = "warn", value_name = "THRESHOLD")]
    warn: Option<Threshold>,

    /// Critical threshold, N (MB free) or N% (percent used) [default: 90%]
    #[arg(short, long = "crit", value_name = "THRESHOLD")]
    crit: Option<Threshold>,

    /// Per-request timeout in seconds [default: 5]
    #[arg(short, long, value_parser = validate_timeout)]
    timeout: Option<u64>,

    /// Read defaults from this config file instead of the standard locations
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the result as JSON instead of the plugin status line
    #[arg(long)]
    json: bool,

    /// Increase log verbosity on stderr (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print help
    #[arg(long, action = ArgAction::SetTrue)]
    help: bool,
}

/// Validate that the timeout is a positive number of seconds.
fn validate_timeout(s: &str) -> Result<u64, String> {
    let timeout = s
        .parse::<u64>()
        .map_err(|_| "Timeout must be a positive integer".to_owned())?;

    if timeout == 0 {
        return Err("Timeout must be at least 1 second".to_owned());
    }

    Ok(timeout)
}

/// Merge command line overrides onto the configured defaults.
fn resolve_settings(
    args: &Args,
    global: &GlobalConfig,
) -> Result<(SessionConfig, Thresholds), ProbeError> {
    let host = args
        .host
        .as_deref()
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .ok_or_else(|| ProbeError::argument("No host specified (use -h/--host)"))?;

    let mut session = global.to_session_config(host);
    if let Some(port) = args.port {
        session = session.with_port(port);
    }
    if let Some(community) = &args.community {
        session = session.with_community(community.clone());
    }
    if let Some(timeout) = args.timeout {
        session = session.with_timeout(Duration::from_secs(timeout));
    }

    let thresholds = Thresholds::new(
        args.warn.unwrap_or(global.warning),
        args.crit.unwrap_or(global.critical),
    );

    Ok((session, thresholds))
}

/// First line of a clap error without its `error:` prefix.
fn argument_message(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.strip_prefix("error: ").unwrap_or(first).to_owned()
}

async fn run(args: &Args) -> anyhow::Result<CheckResult> {
    let global = match &args.config {
        Some(path) => GlobalConfig::load_from_file(path)?,
        None => GlobalConfig::load()?,
    };
    let (session, thresholds) = resolve_settings(args, &global)?;
    debug!(
        host = %session.host,
        port = session.port,
        timeout = ?session.timeout,
        warning = %thresholds.warning,
        critical = %thresholds.critical,
        "resolved settings"
    );

    let target = format!("{}:{}", session.host, session.port);
    let result = check_host(session, thresholds)
        .await
        .with_context(|| format!("checking memory on {}", target))?;

    Ok(result)
}

/// Print `result` and exit with its status code.
fn finish(result: &CheckResult, json: bool) -> ! {
    let line = if json {
        result
            .to_json()
            .unwrap_or_else(|e| CheckResult::from(&e).to_string())
    } else {
        result.to_string()
    };
    println!("{}", line);
    process::exit(result.exit_code())
}

/// Main entry point for the memory check.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            process::exit(Status::Unknown.exit_code());
        }
        Err(err) => {
            let err = ProbeError::argument(argument_message(&err));
            finish(&CheckResult::from(&err), false)
        }
    };

    if args.help {
        let _ = Args::command().print_help();
        process::exit(Status::Unknown.exit_code());
    }

    init_logging(args.verbose);

    let result = match run(&args).await {
        Ok(result) => result,
        Err(err) => {
            error!("{:#}", err);
            CheckResult::unknown(format!("{:#}", err))
        }
    };

    finish(&result, args.json)
}
