mod capabilities;
mod cli;
mod config;
mod download;
mod errors;
mod models;
mod orchestrator;
mod poller;
mod providers;
mod resume;
#[cfg(test)]
mod test_support;
mod util;

use std::{path::Path, process::ExitCode};

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

use crate::{
    cli::{Cli, Command},
    errors::{Result, SongError},
    orchestrator::{RunOptions, RunOutcome, SongController},
    util::{cancellation, format_local, now_local},
};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let outcome = run(&cli).await;
    exit_code(&cli, outcome)
}

async fn run(cli: &Cli) -> Result<()> {
    let config = config::AppConfig::load()?;

    let (handle, cancel) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(target: "songsmith", "interrupt received, stopping");
            handle.cancel();
        }
    });

    let controller = SongController::new(config, cancel)?;

    match cli.command() {
        Command::Credits => {
            let credits = controller.credits().await?;
            info!(target: "songsmith", credits, "remaining Suno credits");
            println!("{credits}");
        }
        Command::CheckTask(task_id) => {
            let outcome = controller
                .check_task(task_id, &cli.output, cli.poll_settings())
                .await?;
            report(&outcome);
        }
        Command::Generate(request) => {
            let options = RunOptions {
                output: cli.output.clone(),
                skip_images: cli.skip_images,
                poll: cli.poll_settings(),
            };
            if !controller.images_enabled(&options) {
                info!(target: "songsmith", "cover art disabled");
            }
            let outcome = controller.generate(&request, &options).await?;
            report(&outcome);
        }
    }

    Ok(())
}

fn report(outcome: &RunOutcome) {
    info!(
        target: "songsmith",
        task_id = %outcome.task_id,
        audio = %outcome.audio.display(),
        images = outcome.images.len(),
        "song saved"
    );
    if let Some(folder) = &outcome.run_folder {
        info!(target: "songsmith", folder = %folder.display(), "run artifacts");
    }
}

fn exit_code(cli: &Cli, outcome: Result<()>) -> ExitCode {
    let err = match outcome {
        Ok(()) => return ExitCode::SUCCESS,
        Err(err) => err,
    };

    error!(target: "songsmith", "{err}");
    if let Some(task_id) = err.resumable_task() {
        eprintln!("{}", resume_hint(task_id.as_str(), &cli.output));
    }

    ExitCode::from(exit_status(&err))
}

fn exit_status(err: &SongError) -> u8 {
    match err {
        SongError::Timeout { .. } => 2,
        SongError::Cancelled { .. } | SongError::Interrupted => 130,
        _ => 1,
    }
}

fn resume_hint(task_id: &str, output: &Path) -> String {
    format!(
        "The task is still running. Resume later with:\n  songsmith --check-task {task_id} --output {}",
        output.display()
    )
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_timer(LocalTimer)
        .init();
}

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = now_local();
        write!(w, "{}", format_local(&now, "%Y-%m-%d %H:%M:%S%:z"))
    }
}
