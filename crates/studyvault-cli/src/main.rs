//! studyvault: command-line backup, restore and scheduling.
//!
//! Every command prints a JSON document on stdout. Logs go to stderr or to
//! `LOG_FILE`.

mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::error;

use studyvault_backup::{BackupConfig, RestoreMode};
use studyvault_core::defaults::{BACKUP_DIR, CLEANUP_KEEP_COUNT};
use studyvault_jobs::ScheduleConfig;

use crate::commands::Connection;

/// Exit code for a snapshot that failed validation.
const EXIT_INVALID: u8 = 2;

#[derive(Parser)]
#[command(name = "studyvault")]
#[command(author, version, about = "Backup and recovery for the studyvault database")]
#[command(propagate_version = true)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "postgres://localhost/studyvault"
    )]
    database_url: String,

    /// Maximum pool connections
    #[arg(long, global = true, env = "DB_MAX_CONNECTIONS")]
    max_connections: Option<u32>,

    /// Seconds to wait for a database connection
    #[arg(long, global = true, env = "DB_CONNECT_TIMEOUT_SECS")]
    connect_timeout: Option<u64>,

    /// Directory holding snapshot files
    #[arg(long, global = true, env = "BACKUP_DIR", default_value = BACKUP_DIR)]
    backup_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the whole database to a new snapshot file
    Create,

    /// Export one user's data to a new snapshot file
    CreateUser {
        /// User to export
        #[arg(short, long)]
        user_id: i64,
    },

    /// List snapshot files, newest first
    List,

    /// Show snapshot count, total size and age range
    Stats,

    /// Delete all but the newest snapshots
    Cleanup {
        /// Number of snapshots to keep
        #[arg(short, long, default_value_t = CLEANUP_KEEP_COUNT)]
        keep: usize,
    },

    /// Delete one snapshot file by name
    Delete {
        /// Snapshot file name, e.g. backup_2026-01-01_02-00-00.json
        name: String,
    },

    /// Check a snapshot file without touching the database
    Validate {
        path: PathBuf,
    },

    /// Replace the whole database with a snapshot
    Recover {
        path: PathBuf,

        /// Restore into a scratch in-memory store and report the outcome
        #[arg(long)]
        dry_run: bool,
    },

    /// Replace one user's data with a single-user snapshot
    RecoverUser {
        path: PathBuf,

        /// User whose data is replaced; keeps its identity
        #[arg(short, long)]
        user_id: i64,

        /// Restore into a scratch in-memory store and report the outcome
        #[arg(long)]
        dry_run: bool,
    },

    /// Run scheduled backups until interrupted
    Schedule {
        /// Print scheduler status and exit
        #[arg(long, conflicts_with = "trigger")]
        status: bool,

        /// Create one backup now and exit
        #[arg(long)]
        trigger: bool,
    },

    /// Apply database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn print(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let conn = Connection::new(cli.database_url, cli.max_connections, cli.connect_timeout);
    let config = BackupConfig::default().with_backup_dir(cli.backup_dir);

    let output = match cli.command {
        Commands::Create => commands::create(&conn, &config).await?,
        Commands::CreateUser { user_id } => commands::create_user(&conn, &config, user_id).await?,
        Commands::List => commands::list(&config).await?,
        Commands::Stats => commands::stats(&config).await?,
        Commands::Cleanup { keep } => commands::cleanup(&config, keep).await?,
        Commands::Delete { name } => commands::delete(&config, &name).await?,
        Commands::Validate { path } => {
            let report = commands::validate(&path).await?;
            print(&serde_json::to_value(&report)?)?;
            return Ok(if report.valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_INVALID)
            });
        }
        Commands::Recover { path, dry_run } => {
            commands::recover(&conn, &config, &path, RestoreMode::FullReplace, dry_run).await?
        }
        Commands::RecoverUser {
            path,
            user_id,
            dry_run,
        } => {
            let mode = RestoreMode::UserMerge {
                target_user_id: user_id,
            };
            commands::recover(&conn, &config, &path, mode, dry_run).await?
        }
        Commands::Schedule { status, trigger } => {
            let schedule = ScheduleConfig::from_env();
            if status {
                commands::schedule_status(&conn, &config, schedule).await?
            } else if trigger {
                commands::schedule_trigger(&conn, &config, schedule).await?
            } else {
                commands::schedule_run(&conn, &config, schedule).await?
            }
        }
        Commands::Migrate => commands::migrate(&conn).await?,
    };

    print(&output)?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_recover_user() {
        let cli = Cli::try_parse_from([
            "studyvault",
            "recover-user",
            "backups/user_backup_3_2026-01-01_02-00-00.json",
            "--user-id",
            "7",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::RecoverUser {
                user_id, dry_run, ..
            } => {
                assert_eq!(user_id, 7);
                assert!(dry_run);
            }
            _ => panic!("expected recover-user"),
        }
    }

    #[test]
    fn test_pool_flags_reach_connection() {
        let cli = Cli::try_parse_from([
            "studyvault",
            "--max-connections",
            "3",
            "--connect-timeout",
            "7",
            "create",
        ])
        .unwrap();
        let conn = Connection::new(cli.database_url, cli.max_connections, cli.connect_timeout);
        assert_eq!(conn.pool.max_connections, 3);
        assert_eq!(conn.pool.acquire_timeout, std::time::Duration::from_secs(7));
    }

    #[test]
    fn test_cleanup_default_keep() {
        let cli = Cli::try_parse_from(["studyvault", "cleanup"]).unwrap();
        match cli.command {
            Commands::Cleanup { keep } => assert_eq!(keep, CLEANUP_KEEP_COUNT),
            _ => panic!("expected cleanup"),
        }
    }

    #[test]
    fn test_schedule_flags_conflict() {
        assert!(Cli::try_parse_from(["studyvault", "schedule", "--status", "--trigger"]).is_err());
    }
}
