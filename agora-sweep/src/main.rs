//! agora-sweep - User liveness sweep
//!
//! Marks users inactive once they have been unseen longer than the
//! configured window, and live again if they have reappeared. Intended to
//! run from a scheduler (cron, systemd timer); a run over unchanged data
//! is a no-op. The voting core never triggers this job - it only reads
//! the live-population count the sweep maintains.

use agora_common::config::{ensure_root_folder, resolve_root_folder};
use agora_common::db::init::init_database;
use agora_common::db::settings::user_inactive_period_days;
use agora_common::db::users::{sweep_liveness, sweep_liveness_dry_run};
use anyhow::Result;
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "agora-sweep", about = "Mark users inactive after the inactivity window")]
struct Args {
    /// Root folder holding agora.db (falls back to AGORA_ROOT, then config file)
    #[arg(long)]
    root_folder: Option<String>,

    /// Override the inactivity window from the settings table
    #[arg(long)]
    window_days: Option<i64>,

    /// Report what would change without writing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting agora-sweep v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let root_folder = resolve_root_folder(args.root_folder.as_deref());
    let db_path = ensure_root_folder(&root_folder)?;
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path).await?;

    let window_days = match args.window_days {
        Some(days) => days,
        None => user_inactive_period_days(&pool).await?,
    };

    let report = if args.dry_run {
        let report = sweep_liveness_dry_run(&pool, window_days).await?;
        info!(
            "Dry run: {} users, {} would be marked inactive, {} would be marked live",
            report.total_users, report.marked_inactive, report.marked_live
        );
        report
    } else {
        sweep_liveness(&pool, window_days).await?
    };

    info!(
        "Sweep complete ({} users, window {} days)",
        report.total_users, window_days
    );

    Ok(())
}
