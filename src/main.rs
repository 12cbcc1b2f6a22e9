use std::ops::ControlFlow;
use std::path::PathBuf;

use aideon_tokens::aideon::tokens::backup::{BackupManager, RollbackOptions};
use aideon_tokens::aideon::tokens::config::{self, TokensConfig};
use aideon_tokens::aideon::tokens::logging;
use aideon_tokens::aideon::tokens::recovery::RecoveryOptions;
use aideon_tokens::aideon::tokens::sync;
use aideon_tokens::aideon::tokens::validate::{
    ValidationReport, validate_all, validate_references, validate_roundtrip, validate_structure,
    validate_themes,
};
use aideon_tokens::aideon::tokens::watch::EditSession;
use aideon_tokens::{Result, TokenError};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Map;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let workspace = std::env::current_dir()?;
    let settings = config::load(cli.config.as_deref(), &workspace)?;
    logging::init(&settings.logging, cli.verbose)?;
    let backups = BackupManager::from_config(&settings.backup, &workspace);

    match cli.command {
        Command::Split(args) => {
            if !args.input.exists() {
                return Err(TokenError::MissingInput(args.input));
            }
            let outcome = sync::split_with_backup(&args.input, &args.output, &backups);
            print_json(&outcome)?;
            exit_unless(outcome.success);
            Ok(())
        }
        Command::Consolidate(args) => {
            if !args.input.is_dir() {
                return Err(TokenError::MissingInput(args.input));
            }
            let outcome = sync::consolidate_with_backup(&args.input, &args.output, &backups);
            print_json(&outcome)?;
            exit_unless(outcome.success);
            Ok(())
        }
        Command::Validate(args) => execute_validate(args, &settings),
        Command::Backup(args) => execute_backup(args, &backups),
        Command::Rollback(args) => {
            let report = backups.rollback(
                &args.backup_id,
                RollbackOptions {
                    dry_run: args.dry_run,
                    force: args.force,
                },
            )?;
            print_json(&report)?;
            exit_unless(report.success());
            Ok(())
        }
        Command::Recover(args) => {
            let options = RecoveryOptions {
                auto_fix: !args.plan_only,
                backup_first: !args.no_backup,
            };
            let (_, recovery) =
                sync::validate_and_recover(&args.dir, options, &backups, &settings.themes);
            print_json(&recovery)?;
            exit_unless(recovery.success);
            Ok(())
        }
        Command::Watch(args) => execute_watch(args, &settings),
    }
}

fn execute_validate(args: ValidateArgs, settings: &TokensConfig) -> Result<()> {
    let rules = &settings.themes;
    let report = match args.check {
        Check::Structure => validate_structure(&args.dir),
        Check::References => validate_references(&args.dir),
        Check::Roundtrip => validate_roundtrip(&args.dir, args.original.as_deref()),
        Check::Themes => validate_themes(&args.dir, rules),
        Check::All => validate_all(&args.dir, rules),
    };

    if args.json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    exit_unless(report.is_valid());
    Ok(())
}

fn execute_backup(args: BackupArgs, backups: &BackupManager) -> Result<()> {
    match args.action {
        BackupAction::List { operation } => {
            let manifests = backups.list_backups(operation.as_deref())?;
            print_json(&manifests)
        }
        BackupAction::Create { operation, paths } => {
            let manifest = backups.create_backup(&operation, &paths, Map::new())?;
            print_json(&manifest)
        }
        BackupAction::Delete { backup_id } => {
            backups.delete_backup(&backup_id)?;
            println!("deleted {backup_id}");
            Ok(())
        }
    }
}

fn execute_watch(args: WatchArgs, settings: &TokensConfig) -> Result<()> {
    if !args.dir.is_dir() {
        return Err(TokenError::MissingInput(args.dir));
    }
    let mut session = EditSession::new(&args.dir, &settings.watch)?;
    if let Some(interval_ms) = args.interval_ms {
        session = session.with_interval(std::time::Duration::from_millis(interval_ms));
    }
    session.run(args.max_ticks, |update| {
        for change in &update.changes {
            println!("{change:?}");
        }
        print_report(&update.report);
        ControlFlow::Continue(())
    })?;
    Ok(())
}

fn print_report(report: &ValidationReport) {
    for issue in &report.issues {
        println!("{issue}");
    }
    println!("{}", report.summary());
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_unless(success: bool) {
    if !success {
        std::process::exit(2);
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Split, consolidate, validate and recover design-token repositories."
)]
struct Cli {
    /// Configuration file; defaults to aideon-tokens.toml in the working directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split a canonical token document into a modular directory.
    Split(TransformArgs),
    /// Consolidate a modular directory into a canonical document.
    Consolidate(TransformArgs),
    /// Validate a modular directory.
    Validate(ValidateArgs),
    /// Manage backups.
    Backup(BackupArgs),
    /// Restore the files of a backup.
    Rollback(RollbackArgs),
    /// Validate a directory and attempt automatic repairs.
    Recover(RecoverArgs),
    /// Re-validate files as they change.
    Watch(WatchArgs),
}

#[derive(clap::Args)]
struct TransformArgs {
    /// Input document or directory.
    #[arg(long)]
    input: PathBuf,

    /// Output directory or document.
    #[arg(long)]
    output: PathBuf,
}

#[derive(clap::Args)]
struct ValidateArgs {
    /// Modular token directory.
    #[arg(long)]
    dir: PathBuf,

    #[arg(long, value_enum, default_value_t = Check::All)]
    check: Check,

    /// Canonical document to roundtrip instead of the directory's own.
    #[arg(long)]
    original: Option<PathBuf>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Check {
    Structure,
    References,
    Roundtrip,
    Themes,
    All,
}

#[derive(clap::Args)]
struct BackupArgs {
    #[command(subcommand)]
    action: BackupAction,
}

#[derive(Subcommand)]
enum BackupAction {
    /// List backups, newest first.
    List {
        #[arg(long)]
        operation: Option<String>,
    },
    /// Back up files or directories.
    Create {
        #[arg(long, default_value = "manual")]
        operation: String,

        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Delete a backup.
    Delete { backup_id: String },
}

#[derive(clap::Args)]
struct RollbackArgs {
    backup_id: String,

    /// List the files that would be restored without touching them.
    #[arg(long)]
    dry_run: bool,

    /// Restore even over missing paths or uncommitted changes.
    #[arg(long)]
    force: bool,
}

#[derive(clap::Args)]
struct RecoverArgs {
    #[arg(long)]
    dir: PathBuf,

    /// Report the fixes without applying them.
    #[arg(long)]
    plan_only: bool,

    /// Skip the backup taken before fixes are applied.
    #[arg(long)]
    no_backup: bool,
}

#[derive(clap::Args)]
struct WatchArgs {
    #[arg(long)]
    dir: PathBuf,

    /// Poll interval, overriding the configured one.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Stop after this many polls.
    #[arg(long)]
    max_ticks: Option<usize>,
}

