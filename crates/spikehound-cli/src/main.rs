//! `spikehound` command line
//!
//! Runs the orchestration core in-process against alert files, walks an
//! approval through the saga, and checks webhook signatures offline.

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde_json::{json, Value};
use spikehound_core::config::env;
use spikehound_core::{AlertResponse, SpikehoundConfig, SpikehoundService};
use spikehound_model::{ApprovalDecision, ApprovalRecord, Clock, SystemClock};
use spikehound_security::{
    DiscordSignatureVerifier, Headers, ReplayWindow, SlackSignatureVerifier, DEFAULT_MAX_AGE_SECS,
    DISCORD_SIGNATURE_HEADER, DISCORD_TIMESTAMP_HEADER, SLACK_SIGNATURE_HEADER,
    SLACK_TIMESTAMP_HEADER,
};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

const CLI_SOURCE: &str = "cli";

fn cli() -> Command {
    Command::new("spikehound")
        .version(spikehound_core::VERSION)
        .about("Alert investigation with human-approved remediation")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file; environment variables override it"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
        .subcommand(
            Command::new("investigate")
                .about("Run one investigation from an alert JSON file and print the response")
                .arg(alert_arg()),
        )
        .subcommand(
            Command::new("simulate")
                .about("Investigate an alert, then record a decision and run the approval saga")
                .arg(alert_arg())
                .arg(
                    Arg::new("decision")
                        .long("decision")
                        .default_value("approve")
                        .value_parser(["approve", "reject", "investigate"])
                        .help("Decision to record"),
                )
                .arg(
                    Arg::new("user")
                        .long("user")
                        .default_value("cli")
                        .help("Name recorded as the decider"),
                )
                .arg(
                    Arg::new("execute")
                        .long("execute")
                        .action(ArgAction::SetTrue)
                        .help("Enable remediation execution for this run"),
                ),
        )
        .subcommand(signature_command("verify-slack", "Check a Slack request signature").arg(
            Arg::new("secret")
                .long("secret")
                .env(env::SLACK_SIGNING_SECRET)
                .hide_env_values(true)
                .required(true)
                .help("Slack signing secret"),
        ))
        .subcommand(
            signature_command("verify-discord", "Check a Discord interaction signature").arg(
                Arg::new("public-key")
                    .long("public-key")
                    .env(env::DISCORD_PUBLIC_KEY)
                    .required(true)
                    .help("Application public key, hex"),
            ),
        )
}

fn alert_arg() -> Arg {
    Arg::new("alert")
        .long("alert")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Path to the alert JSON payload")
}

fn signature_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(
            Arg::new("timestamp")
                .long("timestamp")
                .required(true)
                .help("Timestamp header value"),
        )
        .arg(
            Arg::new("signature")
                .long("signature")
                .required(true)
                .help("Signature header value"),
        )
        .arg(
            Arg::new("body")
                .long("body")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("File holding the raw request body"),
        )
        .arg(
            Arg::new("now")
                .long("now")
                .value_parser(value_parser!(i64))
                .help("Unix seconds to check against instead of the system clock"),
        )
        .arg(
            Arg::new("window")
                .long("window")
                .default_value("300")
                .value_parser(value_parser!(u64))
                .help("Maximum timestamp skew in seconds"),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("investigate", args)) => investigate(&matches, args).await,
        Some(("simulate", args)) => simulate(&matches, args).await,
        Some(("verify-slack", args)) => {
            let secret = required(args, "secret")?;
            let verifier = SlackSignatureVerifier::new(secret).with_window(window(args));
            let headers = signature_headers(args, SLACK_TIMESTAMP_HEADER, SLACK_SIGNATURE_HEADER)?;
            let body = read_body(args)?;
            report_signature(verifier.check(&headers, &body, now(args)))
        }
        Some(("verify-discord", args)) => {
            let key = required(args, "public-key")?;
            let verifier = DiscordSignatureVerifier::new(key).with_window(window(args));
            let headers =
                signature_headers(args, DISCORD_TIMESTAMP_HEADER, DISCORD_SIGNATURE_HEADER)?;
            let body = read_body(args)?;
            report_signature(verifier.check(&headers, &body, now(args)))
        }
        _ => bail!("unknown command"),
    }
}

async fn investigate(global: &ArgMatches, args: &ArgMatches) -> Result<()> {
    let config = load_config(global)?;
    let service = SpikehoundService::builder(config).build()?;
    let alert = read_alert(args)?;

    let response = service
        .intake
        .receive(&alert, &CancellationToken::new())
        .await?;
    if let AlertResponse::Accepted { handle, .. } = &response {
        info!(instance_id = %handle, "waiting for background investigation");
        service.wait_idle().await;
    }
    print_json(&response.body()?)?;

    service.shutdown().await;
    Ok(())
}

async fn simulate(global: &ArgMatches, args: &ArgMatches) -> Result<()> {
    let mut config = load_config(global)?.with_durable(false);
    if args.get_flag("execute") {
        config = config.with_execution_enabled(true);
    }
    let service = SpikehoundService::builder(config).build()?;
    let alert = read_alert(args)?;

    let response = service
        .intake
        .receive(&alert, &CancellationToken::new())
        .await?;
    let AlertResponse::Report { report, .. } = &response else {
        bail!("expected an inline report");
    };
    let investigation_id = report.investigation_id().to_string();

    let decision = match required(args, "decision")?.as_str() {
        "approve" => ApprovalDecision::Approve,
        "reject" => ApprovalDecision::Reject,
        _ => ApprovalDecision::Investigate,
    };
    let record = ApprovalRecord::new(
        &investigation_id,
        decision,
        required(args, "user")?.as_str(),
        SystemClock.now(),
    );
    service.state.record_approval(record.clone());

    let outcome = service
        .workflow
        .queue_approved_execution(&investigation_id, &record, CLI_SOURCE, service.executions.as_ref())
        .await;
    service.wait_idle().await;

    print_json(&json!({
        "investigation_id": investigation_id,
        "decision": decision,
        "queue_outcome": outcome,
        "message": outcome.user_text(),
        "plan": report.plan(),
        "outcomes": service.state.latest_outcomes(&investigation_id),
    }))?;

    service.shutdown().await;
    Ok(())
}

fn load_config(global: &ArgMatches) -> Result<SpikehoundConfig> {
    let path = global.get_one::<PathBuf>("config");
    SpikehoundConfig::load(path.map(PathBuf::as_path)).context("failed to load configuration")
}

fn read_alert(args: &ArgMatches) -> Result<Value> {
    let path = args
        .get_one::<PathBuf>("alert")
        .context("missing --alert")?;
    let text = read_file(path)?;
    serde_json::from_slice(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn read_body(args: &ArgMatches) -> Result<Vec<u8>> {
    let path = args.get_one::<PathBuf>("body").context("missing --body")?;
    read_file(path)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a String> {
    args.get_one::<String>(name)
        .with_context(|| format!("missing --{name}"))
}

fn signature_headers(args: &ArgMatches, timestamp: &str, signature: &str) -> Result<Headers> {
    let mut headers = Headers::new();
    headers.insert(timestamp.to_string(), required(args, "timestamp")?.clone());
    headers.insert(signature.to_string(), required(args, "signature")?.clone());
    Ok(headers)
}

fn window(args: &ArgMatches) -> ReplayWindow {
    ReplayWindow::new(
        args.get_one::<u64>("window")
            .copied()
            .unwrap_or(DEFAULT_MAX_AGE_SECS),
    )
}

fn now(args: &ArgMatches) -> i64 {
    args.get_one::<i64>("now")
        .copied()
        .unwrap_or_else(|| SystemClock.epoch_seconds())
}

fn report_signature<E: std::fmt::Display>(result: std::result::Result<(), E>) -> Result<()> {
    match result {
        Ok(()) => {
            println!("valid");
            Ok(())
        }
        Err(err) => {
            println!("invalid: {err}");
            std::process::exit(1);
        }
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn simulate_defaults_to_approve() {
        let matches = cli()
            .try_get_matches_from(["spikehound", "simulate", "--alert", "a.json"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(required(args, "decision").unwrap(), "approve");
        assert!(!args.get_flag("execute"));
    }

    #[test]
    fn signature_window_and_now_are_parsed() {
        let matches = cli()
            .try_get_matches_from([
                "spikehound",
                "verify-slack",
                "--secret",
                "s",
                "--timestamp",
                "100",
                "--signature",
                "v0=00",
                "--body",
                "b.txt",
                "--now",
                "120",
                "--window",
                "10",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(now(args), 120);
        assert_eq!(window(args).max_age_secs(), 10);

        let headers = signature_headers(args, SLACK_TIMESTAMP_HEADER, SLACK_SIGNATURE_HEADER).unwrap();
        assert_eq!(headers[SLACK_TIMESTAMP_HEADER], "100");
    }

    #[test]
    fn unknown_decision_is_rejected() {
        let result = cli().try_get_matches_from([
            "spikehound",
            "simulate",
            "--alert",
            "a.json",
            "--decision",
            "maybe",
        ]);
        assert!(result.is_err());
    }
}
