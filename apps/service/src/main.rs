use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::info;

use upcheck::config::Config;
use upcheck::database::CHECKS;
use upcheck::monitoring::types::generate_check_id;
use upcheck::monitoring::validate_check;
use upcheck::orchestrator::Orchestrator;

#[derive(Parser)]
#[command(name = "upcheck", version, about = "Endpoint uptime monitor")]
struct Cli {
    /// Path to the config file (defaults to $XDG_CONFIG_HOME/upcheck/config.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the check and rotation workers until interrupted (default)
    Run,
    /// Run one check cycle and wait for every evaluation
    Cycle,
    /// Rotate every live log stream once
    Rotate,
    /// Print the decoded contents of a log archive
    Decompress {
        #[arg(value_name = "ARCHIVE_ID")]
        archive_id: String,
    },
    /// Store a new check
    AddCheck(AddCheckArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
struct AddCheckArgs {
    /// 10 digit phone number of the check owner
    #[arg(long)]
    owner: String,

    /// Host and path to probe, without the scheme
    #[arg(long)]
    url: String,

    #[arg(long, default_value = "https")]
    protocol: String,

    #[arg(long, default_value = "get")]
    method: String,

    /// Comma separated status codes counted as up
    #[arg(long, value_delimiter = ',', default_value = "200")]
    success_codes: Vec<u16>,

    #[arg(long, default_value_t = 5)]
    timeout_seconds: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_ref()).context("loading config")?;

    let level = config.logging.level.parse().unwrap_or(logger::LevelFilter::INFO);
    let format = config.logging.format.parse().unwrap_or_default();
    logger::init_tracing(level, format);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => Orchestrator::start(config).await?,
        Command::Cycle => {
            let orchestrator = Orchestrator::new(&config).await?;
            let evaluations = orchestrator.run_cycle().await.join().await;
            for evaluation in &evaluations {
                println!("{evaluation:?}");
            }
            info!("Evaluated {} checks", evaluations.len());
        }
        Command::Rotate => {
            let orchestrator = Orchestrator::new(&config).await?;
            let report = orchestrator.rotate_logs().await;
            println!(
                "rotated: {}, empty: {}, failed: {}",
                report.rotated, report.empty, report.failed
            );
        }
        Command::Decompress { archive_id } => {
            let orchestrator = Orchestrator::new(&config).await?;
            print!("{}", orchestrator.audit_log().decompress(&archive_id).await?);
        }
        Command::AddCheck(args) => add_check(&config, args).await?,
        Command::Config => print!("{config}"),
    }

    Ok(())
}

async fn add_check(config: &Config, args: AddCheckArgs) -> anyhow::Result<()> {
    let record = json!({
        "id": generate_check_id(),
        "ownerId": args.owner,
        "protocol": args.protocol,
        "url": args.url,
        "method": args.method,
        "successCodes": args.success_codes,
        "timeoutSeconds": args.timeout_seconds,
        "state": "down",
    });

    let check = match validate_check(&record) {
        Ok(check) => check,
        Err(errors) => {
            let reasons: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!("invalid check: {}", reasons.join("; "));
        }
    };

    let orchestrator = Orchestrator::new(config).await?;
    orchestrator.database().create(CHECKS, &check.id, &check.to_record()?).await?;
    println!("{}", check.id);
    Ok(())
}
