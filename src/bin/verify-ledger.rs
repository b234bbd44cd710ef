use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, Command};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use guardian_ledger::config::{AppConfig, MAX_DIFFICULTY};
use guardian_ledger::ledger::{ChainVerification, EventsLedger, EvidenceLedger};
use guardian_ledger::localchain::{MiningLimits, ProofOfWorkChain};

fn main() -> Result<()> {
    let defaults = AppConfig::default();

    let matches = Command::new("verify-ledger")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Verify Guardian ledger and local chain integrity")
        .arg(
            Arg::new("dir")
                .short('d')
                .long("dir")
                .value_name("DIR")
                .help("Ledger directory (default ./ledger)")
                .env("LEDGER_DIR"),
        )
        .arg(
            Arg::new("difficulty")
                .long("difficulty")
                .value_name("N")
                .help("Proof-of-work difficulty the local chain must meet (default 3)")
                .env("POW_DIFFICULTY")
                .value_parser(value_parser!(u32).range(1..=MAX_DIFFICULTY as i64)),
        )
        .arg(
            Arg::new("ledger")
                .short('l')
                .long("ledger")
                .value_name("LEDGER")
                .help("Which log to verify")
                .value_parser(["evidence", "events", "blocks", "all"])
                .default_value("all"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable verbose output"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Suppress output except errors"),
        )
        .get_matches();

    let dir = matches
        .get_one::<String>("dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| defaults.ledger_dir.clone());
    let difficulty = matches.get_one::<u32>("difficulty").copied().unwrap_or(defaults.pow.difficulty);
    let selected = matches
        .get_one::<String>("ledger")
        .map(String::as_str)
        .unwrap_or("all");
    let verbose = matches.get_flag("verbose");
    let quiet = matches.get_flag("quiet");

    let level = if quiet {
        tracing::Level::ERROR
    } else if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = AppConfig {
        ledger_dir: dir,
        ..defaults
    };

    let mut failures = Vec::new();
    for name in ["evidence", "events", "blocks"] {
        if selected != "all" && selected != name {
            continue;
        }
        let result = verify_one(&config, name, difficulty)?;
        report(name, &result, quiet);
        if !result.valid {
            failures.push(name);
        }
    }

    if !failures.is_empty() {
        error!("Verification failed for: {}", failures.join(", "));
        std::process::exit(1);
    }

    if !quiet {
        println!("✓ Ledger verification completed successfully");
    }
    Ok(())
}

fn verify_one(config: &AppConfig, name: &str, difficulty: u32) -> Result<ChainVerification> {
    let path = match name {
        "evidence" => config.evidence_ledger_path(),
        "events" => config.events_ledger_path(),
        _ => config.blocks_path(),
    };
    info!("Verifying {} log: {}", name, path.display());
    note_if_missing(&path);

    let result = match name {
        "evidence" => EvidenceLedger::new(path).verify()?,
        "events" => EventsLedger::new(path).verify()?,
        _ => ProofOfWorkChain::new(path, difficulty, MiningLimits::default()).verify()?,
    };
    Ok(result)
}

fn note_if_missing(path: &Path) {
    if !path.exists() {
        info!("{} does not exist, treating as empty", path.display());
    }
}

fn report(name: &str, result: &ChainVerification, quiet: bool) {
    if quiet && result.valid {
        return;
    }
    let mark = if result.valid { "✓" } else { "✗" };
    println!(
        "{} {:<8} valid={} count={}",
        mark, name, result.valid, result.count
    );
}
