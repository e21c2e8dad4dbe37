//! Local LLM debate arena.
//!
//! Drives multi-round PRO/CON debates against a local Ollama server, repairs
//! malformed model output, runs critic audits, and exports the transcript as
//! the sole durable artifact.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use arena::core::parse::is_protest;
use arena::core::side::Side;
use arena::core::transcript::RoundRecord;
use arena::exit_codes;
use arena::io::config::{ArenaConfig, load_config, write_config};
use arena::io::export::{export_transcript, validate_transcript_value};
use arena::io::gateway::OllamaGateway;
use arena::session::DebateSession;

#[derive(Parser)]
#[command(
    name = "arena",
    version,
    about = "Multi-round LLM debate runner with critic audits"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a starter `arena.toml` if missing.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Run a full debate and export the transcript.
    Run {
        /// Config file path.
        #[arg(long, default_value = "arena.toml")]
        config: PathBuf,
        /// Where to write the transcript JSON.
        #[arg(long, default_value = "transcript.json")]
        out: PathBuf,
        /// Skip the warm-up calls.
        #[arg(long)]
        no_warmup: bool,
        /// Override the configured number of exchange rounds.
        #[arg(long)]
        rounds: Option<u32>,
        /// Base URL of the inference server.
        #[arg(long, default_value = "http://localhost:11434")]
        backend: String,
    },
    /// Check an exported transcript against the bundled schema.
    Validate {
        /// Transcript JSON path.
        path: PathBuf,
    },
}

fn main() {
    arena::logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_codes::INVALID);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(force),
        Command::Run {
            config,
            out,
            no_warmup,
            rounds,
            backend,
        } => cmd_run(&config, &out, no_warmup, rounds, &backend),
        Command::Validate { path } => cmd_validate(&path),
    }
}

fn cmd_init(force: bool) -> Result<()> {
    let path = Path::new("arena.toml");
    if path.exists() && !force {
        println!("{} already exists (use --force to overwrite)", path.display());
        return Ok(());
    }
    write_config(path, &ArenaConfig::default())?;
    println!("wrote {}", path.display());
    Ok(())
}

fn cmd_run(
    config_path: &Path,
    out: &Path,
    no_warmup: bool,
    rounds: Option<u32>,
    backend: &str,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(rounds) = rounds {
        config.rounds = rounds;
    }
    let exchange_rounds = config.rounds;
    let gateway = OllamaGateway::new(backend);
    let mut session = DebateSession::new(config);

    if !no_warmup {
        let report = session.warm_up(&gateway);
        println!("warm-up: PRO {} | CON {} | CRITIC {}", report.pro, report.con, report.critic);
    }

    let baseline = session.generate_baseline(&gateway)?;
    print_round(baseline);
    for _ in 0..exchange_rounds {
        let round = session.exchange_step(&gateway)?;
        print_round(round);
    }

    let finals = session.finalize(&gateway)?;
    println!("PRO final: {}", first_line(&finals.pro.output.final_statement));
    println!("CON final: {}", first_line(&finals.con.output.final_statement));

    let report = session.run_critic(&gateway)?;
    println!("verdict: {}", first_line(&report.verdict));
    println!(
        "drift: PRO {} | CON {}",
        report.drift_audit.total_pro_mismatches, report.drift_audit.total_con_mismatches
    );

    export_transcript(out, session.transcript())?;
    println!("transcript written to {}", out.display());
    Ok(())
}

fn cmd_validate(path: &Path) -> Result<()> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let instance: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse {}", path.display()))?;
    validate_transcript_value(&instance)?;
    println!("{} is a valid transcript", path.display());
    Ok(())
}

fn print_round(record: &RoundRecord) {
    println!("--- round {} ---", record.round);
    for (side, side_record) in [(Side::Pro, &record.pro), (Side::Con, &record.con)] {
        let output = &side_record.output;
        let marker = if !output.side_mismatch {
            ""
        } else if is_protest(&output.side_confirm, side) {
            " [PROTEST]"
        } else {
            " [DRIFT]"
        };
        match &output.error {
            Some(err) if output.reasoning.is_empty() => {
                println!("{side}{marker}: <error: {err}>");
            }
            _ => println!("{side}{marker}: {}", first_line(&output.reasoning)),
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
