mod bootstrap;
mod report;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use audit_core::error::AuditError;
use audit_core::settings::{Cli, Command, SettingsAction};
use audit_data::metrics::BucketFilter;
use audit_runtime::{
    export_report, JsonStore, MetricsStore, PipelineConfig, PipelineRunner, RunStatus, RunTarget,
};

/// Exit code for a run that could not start because another one holds the lock.
const EXIT_CONFLICT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::load();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            let conflict = e
                .downcast_ref::<AuditError>()
                .map(AuditError::is_conflict)
                .unwrap_or(false);
            if conflict {
                ExitCode::from(EXIT_CONFLICT)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let store_dir = cli.store_dir();
    let log_dir = cli.log_dir();
    bootstrap::ensure_directories(&store_dir, &log_dir)?;

    // Only pipeline runs write to the rolling log file.
    let file_logging = matches!(cli.command, Command::Run { .. } | Command::Backfill { .. });
    let _log_guard = bootstrap::setup_logging(&cli.log_level, file_logging.then_some(log_dir.as_path()))?;

    tracing::info!("backup-audit v{} starting", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(
        JsonStore::open(&store_dir)
            .with_context(|| format!("opening store at {}", store_dir.display()))?,
    );

    match cli.command.clone() {
        Command::Run { date } => {
            let target = date.map(RunTarget::Date).unwrap_or(RunTarget::Latest);
            run_pipeline(&cli, store, target).await
        }
        Command::Backfill { from } => run_pipeline(&cli, store, RunTarget::Backfill { from }).await,
        Command::Status => {
            match store.last_run()? {
                Some(run) => print!("{}", report::render_run(&run)),
                None => println!("No pipeline runs recorded in {}", store_dir.display()),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { date } => {
            let snapshot = match date {
                Some(d) => store.load_snapshot(d)?,
                None => store.latest_snapshot()?,
            };
            match snapshot {
                Some(snapshot) => {
                    print!("{}", report::render_snapshot(&snapshot));
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    let what = date
                        .map(|d| format!("for {d}"))
                        .unwrap_or_else(|| "yet".to_string());
                    println!("No metrics stored {what}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Export { from, to, out } => {
            let out_dir = out.unwrap_or_else(Cli::reports_dir);
            let export = export_report(store.as_ref(), from, to, &out_dir)?;
            print!("{}", report::render_export(&export));
            Ok(ExitCode::SUCCESS)
        }
        Command::Settings { action } => {
            let mut settings = store.load_settings()?;
            if let Some(SettingsAction::Set { key, value }) = action {
                settings.set(key, value)?;
                store.save_settings(&settings)?;
                tracing::info!(%key, value, "Setting updated");
            }
            print!("{}", report::render_settings(&settings));
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_pipeline(cli: &Cli, store: Arc<JsonStore>, target: RunTarget) -> Result<ExitCode> {
    let config = PipelineConfig::new(&cli.veeam_dir, &cli.wasabi_dir)
        .with_bucket_filter(BucketFilter::new(&cli.bucket_filter));
    let runner = PipelineRunner::new(store, config);

    let outcome = runner.run(target).await?;
    print!("{}", report::render_outcome(&outcome));

    Ok(match outcome.status() {
        RunStatus::Completed | RunStatus::CompletedWithWarnings => ExitCode::SUCCESS,
        RunStatus::Failed => ExitCode::FAILURE,
    })
}
