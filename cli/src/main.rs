//! attest: verification and anchoring CLI
//!
//! A thin operator front end over the admin API. It never holds database
//! credentials: events and chain heads are always fetched over HTTP.
//!
//! Usage:
//!   attest verify <projectId> [--anchors <path>] [--lineage]
//!   attest anchor [--mode dev|prod]
//!   attest runs [--limit N]
//!
//! Global `--config <path>` loads a TOML file before environment overrides.
//! Exit code 0 means every check passed; anything else exits 1.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use attest_anchor::{
    verify_project, AdminClient, AnchorWriter, AttestConfig, DevAnchorWriter, GitCli,
    ProdAnchorWriter, VerifyOptions,
};
use attest_contracts::{
    AnchorMode, AnchorRunReport, AttestError, AttestResult, ProjectId, Severity,
    VerificationOutcome, VerificationReport,
};
use attest_core::AdminApi;

// ── CLI definition ────────────────────────────────────────────────────────────

/// attest: tamper-evident audit log verification.
#[derive(Parser)]
#[command(
    name = "attest",
    about = "Verify and anchor attest audit chains",
    long_about = "Verifies project hash chains against externally anchored snapshots,\n\
                  and takes new anchor snapshots."
)]
struct Cli {
    /// TOML configuration file, applied before environment overrides.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify one project's chain, then cross-check it against the latest anchor.
    Verify {
        project_id: String,
        /// Anchor directory. Defaults to ANCHOR_DIR.
        #[arg(long)]
        anchors: Option<PathBuf>,
        /// Also check the anchor repository's commit lineage.
        #[arg(long)]
        lineage: bool,
    },
    /// Take one anchor snapshot of every project's chain head.
    Anchor {
        /// Overrides ANCHOR_MODE.
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// List recent anchor runs.
    Runs {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Dev,
    Prod,
}

impl From<ModeArg> for AnchorMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Dev => AnchorMode::Dev,
            ModeArg::Prod => AnchorMode::Prod,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = AttestConfig::load(cli.config.as_deref()).and_then(|config| match cli.command {
        Command::Verify {
            project_id,
            anchors,
            lineage,
        } => run_verify(&config, ProjectId::new(project_id), anchors, lineage),
        Command::Anchor { mode } => run_anchor(config, mode.map(AnchorMode::from)),
        Command::Runs { limit } => run_list(&config, limit),
    });

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── verify ────────────────────────────────────────────────────────────────────

fn run_verify(
    config: &AttestConfig,
    project_id: ProjectId,
    anchors: Option<PathBuf>,
    lineage: bool,
) -> AttestResult<bool> {
    let client = AdminClient::from_config(config)?;

    println!("Verifying project {}...", project_id);
    let events = client.events(&project_id)?;
    println!("Loaded {} events.", events.len());

    let anchor_dir = anchors.or_else(|| config.anchor.dir.clone());
    let repo = match (&anchor_dir, lineage) {
        (Some(dir), true) => Some(GitCli::new(dir, config.git_timeout())),
        (None, true) => {
            return Err(AttestError::Config {
                reason: "--lineage needs an anchor directory (--anchors or ANCHOR_DIR)"
                    .to_string(),
            })
        }
        (_, false) => None,
    };

    let mut options = VerifyOptions::default();
    if let Some(dir) = anchor_dir {
        options = options.with_anchor_dir(dir);
    }
    if let Some(repo) = &repo {
        options = options.with_lineage(repo);
    }

    let report = verify_project(&project_id, &events, &options);
    print_report(&report);
    Ok(report.passed())
}

fn print_report(report: &VerificationReport) {
    match &report.outcome {
        VerificationOutcome::ChainBroken(e) => {
            println!("✖ Internal chain broken: {}", e);
            println!("  The database is internally inconsistent (local corruption).");
        }
        VerificationOutcome::ChainOk => {
            println!("✔ Internal chain valid");
            println!("! No anchor directory provided (use --anchors or ANCHOR_DIR).");
            println!("  Anchor check skipped.");
        }
        VerificationOutcome::NoAnchorFound { reason } => {
            println!("✔ Internal chain valid");
            println!("! No anchor to check against: {}", reason);
        }
        VerificationOutcome::AnchorOk {
            anchor,
            lineage_checked,
        } => {
            println!("✔ Internal chain valid");
            println!(
                "✔ Anchor verified ({}, sequence {})",
                anchor.source_file, anchor.last_sequence
            );
            if *lineage_checked {
                println!("✔ Anchor lineage intact");
            }
            println!("✔ No tampering detected");
            println!();
            println!("Events verified: {}", report.event_count);
            println!("Last anchor: {}", anchor.anchored_at.to_rfc3339());
        }
        VerificationOutcome::AnchorFailed(e) => {
            println!("✔ Internal chain valid");
            println!("✖ Anchor verification failed: {}", e);
            println!("  History is self-consistent but diverges from the anchored record.");
        }
    }

    let verdict = match report.severity() {
        Severity::Ok => "PASS",
        Severity::Warning => "PASS (with warnings)",
        Severity::LocalCorruption => "FAIL (local corruption)",
        Severity::AnchorDivergence => "FAIL (anchor divergence)",
    };
    println!("\nResult: {}", verdict);
}

// ── anchor ────────────────────────────────────────────────────────────────────

fn run_anchor(mut config: AttestConfig, mode: Option<AnchorMode>) -> AttestResult<bool> {
    if let Some(mode) = mode {
        config.anchor.mode = mode;
    }

    let client = Arc::new(AdminClient::from_config(&config)?);
    let dir = config.anchor.dir.clone().ok_or_else(|| AttestError::Config {
        reason: "ANCHOR_DIR is not set".to_string(),
    })?;

    let writer: Box<dyn AnchorWriter> = match config.anchor.mode {
        AnchorMode::Dev => Box::new(DevAnchorWriter::new(client.clone(), dir)),
        AnchorMode::Prod => {
            config.validate_for_prod()?;
            let git = GitCli::new(&dir, config.git_timeout()).with_author(
                config.anchor.git.author_name.clone(),
                config.anchor.git.author_email.clone(),
            );
            let mut writer = ProdAnchorWriter::new(client.clone(), Arc::new(git), dir);
            if let Some(remote) = config.push_remote() {
                writer = writer.with_push(remote, config.anchor.git.branch.clone());
            }
            Box::new(writer)
        }
    };

    println!("Anchoring ({} mode)...", writer.mode());
    let run = writer.run();

    if let Err(e) = client.report_anchor_run(&run.report) {
        warn!(error = %e, run_id = %run.report.run_id, "failed to report anchor run");
    }

    let report = &run.report;
    if report.is_success() {
        let count = report.project_count.unwrap_or(0);
        match (&report.anchor_file, &report.git_commit) {
            (Some(file), Some(commit)) => {
                println!("✔ Anchored {} projects in {} ({})", count, file, commit)
            }
            (Some(file), None) => println!("✔ Anchored {} projects in {}", count, file),
            _ => println!("✔ No projects to anchor"),
        }
        Ok(true)
    } else {
        println!(
            "✖ Anchor run failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
        Ok(false)
    }
}

// ── runs ──────────────────────────────────────────────────────────────────────

fn run_list(config: &AttestConfig, limit: usize) -> AttestResult<bool> {
    let client = AdminClient::from_config(config)?;
    let runs = client.anchor_runs(limit)?;
    print_runs(&runs);
    Ok(true)
}

fn print_runs(runs: &[AnchorRunReport]) {
    println!(
        "{:<18}{:<6}{:<10}{:<10}{:<10}ERROR",
        "TIME", "MODE", "STATUS", "PROJECTS", "COMMIT"
    );
    for run in runs {
        let status = format!("{:?}", run.status).to_lowercase();
        let projects = run
            .project_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        let commit: String = run
            .git_commit
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(7)
            .collect();
        let error: String = run.error.as_deref().unwrap_or("").chars().take(30).collect();

        println!(
            "{:<18}{:<6}{:<10}{:<10}{:<10}{}",
            run.started_at.format("%Y-%m-%d %H:%M").to_string(),
            run.mode.as_str(),
            status,
            projects,
            commit,
            error
        );
    }
}
