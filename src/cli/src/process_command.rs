use crate::commands::{Cli, Command, RepoSlug};
use crate::logging::setup_logging;
use crate::printer::{summary_line, Printer};
use crate::version::BuildInfo;
use crate::{error_message, info_message, success_message, warning_message};
use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use ghtail_client::config_manager::{Config, ConfigLoader};
use ghtail_client::correlator::{
    Correlator, SessionEnded, SessionOutcome, SessionSettings, SessionSwitcher,
};
use ghtail_client::discovery::RunDiscoverer;
use ghtail_client::github::{OctocrabGithub, WebClient};
use ghtail_client::resolver::{ResolverSettings, StreamUrlResolver};
use ghtail_client::status::StatusTracker;
use ghtail_client::{TailError, TailResult};
use ghtail_common::types::RunIdentity;
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub fn process_cli() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Version = cli.command {
        println!("{}", BuildInfo::current());
        return Ok(());
    }

    // Use the --config flag, if provided, when loading the configuration
    let config = ConfigLoader::load_config(cli.config.as_deref())?;
    setup_logging(config.log_dir.as_deref())?;
    info!(sources = ?config.config_sources, "configuration loaded");

    if config.user_session.is_none() {
        warning_message!("GITHUB_USER_SESSION is not set; the live log stream will likely be refused");
    }

    tokio::runtime::Runtime::new()?.block_on(run_async_command(cli.command, config))
}

async fn run_async_command(command: Command, config: Config) -> Result<()> {
    let root = CancellationToken::new();
    spawn_ctrl_c(root.clone());

    match command {
        Command::Tail {
            repo,
            workflow,
            job,
        } => tail_workflow(&config, root, repo, workflow, job).await,
        Command::Run { repo, run_id, job } => {
            let run = RunIdentity::new(repo.owner, repo.repo, run_id);
            tail_single_run(&config, root, run, job).await
        }
        Command::Version => Ok(()),
    }
}

fn spawn_ctrl_c(root: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received");
        }
        root.cancel();
    });
}

fn build_correlator(config: &Config, github: Arc<OctocrabGithub>) -> Result<Correlator> {
    let web = WebClient::new(config).context("Failed to set up the web client")?;
    let resolver = StreamUrlResolver::new(Arc::new(web), ResolverSettings::from_config(config));
    Ok(Correlator::new(
        StatusTracker::new(github),
        Arc::new(resolver),
        SessionSettings::from_config(config),
    ))
}

/// Follows a workflow file, moving to every new run as it shows up.
async fn tail_workflow(
    config: &Config,
    root: CancellationToken,
    repo: RepoSlug,
    workflow: String,
    job: Option<String>,
) -> Result<()> {
    let github = Arc::new(OctocrabGithub::from_config(config)?);
    let correlator = build_correlator(config, github.clone())?;

    let (out_tx, mut out_rx) = mpsc::channel(config.event_buffer.max(1) as usize);
    let (reports_tx, mut reports_rx) = mpsc::unbounded_channel();
    let (runs_tx, mut runs_rx) = mpsc::channel(16);

    let mut switcher = SessionSwitcher::new(correlator, root.clone(), out_tx, reports_tx);
    let mut printer = Printer::new(io::stdout().lock(), job);

    info_message!("Watching {} workflow {}", repo, workflow);
    let mut discoverer = RunDiscoverer::new(github, &repo.owner, &repo.repo, workflow, config);
    let mut discovery = {
        let token = root.clone();
        tokio::spawn(async move { discoverer.run(&token, &runs_tx).await })
    };

    let result = loop {
        tokio::select! {
            _ = root.cancelled() => break Ok(()),

            Some(run) = runs_rx.recv() => {
                info_message!("Tailing run #{} {} ({})", run.number, run.name, run.identity);
                printer.follow(run.identity.clone());
                switcher.switch_to(run.identity).await;
            }

            Some(event) = out_rx.recv() => {
                printer.print(&event).context("Failed to write output")?;
            }

            Some(ended) = reports_rx.recv() => report_session(&ended),

            joined = &mut discovery => {
                break joined
                    .context("Run discovery task failed")?
                    .map_err(|e| anyhow::Error::new(e).context("Failed to list workflow runs"));
            }
        }
    };

    root.cancel();
    switcher.shutdown().await;
    while let Ok(ended) = reports_rx.try_recv() {
        report_session(&ended);
    }
    result
}

/// Tails one run until it completes.
async fn tail_single_run(
    config: &Config,
    root: CancellationToken,
    run: RunIdentity,
    job: Option<String>,
) -> Result<()> {
    let github = Arc::new(OctocrabGithub::from_config(config)?);
    let correlator = build_correlator(config, github)?;

    let (out_tx, mut out_rx) = mpsc::channel(config.event_buffer.max(1) as usize);
    let mut printer = Printer::new(io::stdout().lock(), job);
    printer.follow(run.clone());

    info_message!("Tailing run {}", run);
    let session = {
        let run = run.clone();
        tokio::spawn(async move { correlator.tail(&root, &run, out_tx).await })
    };

    while let Some(event) = out_rx.recv().await {
        printer.print(&event).context("Failed to write output")?;
    }

    let result = session.await.context("Tailing task failed")?;
    report_session(&SessionEnded {
        run,
        result: result.clone(),
    });
    finish(result)
}

fn report_session(ended: &SessionEnded) {
    match &ended.result {
        Ok(SessionOutcome::Completed(summary)) => {
            success_message!("Run {} completed ({})", ended.run, summary_line(summary))
        }
        Ok(SessionOutcome::NothingToTail(summary)) => info_message!(
            "Run {} ({}) had already completed; nothing to tail",
            ended.run,
            summary_line(summary)
        ),
        Err(TailError::JobConcluded) => {
            info_message!("Run {} finished before its live log was available", ended.run)
        }
        Err(e) if e.is_cancelled() => debug!(run = %ended.run, "session cancelled"),
        Err(e) => {
            error_message!("{} ({})", e.user_message(), ended.run);
            debug!(run = %ended.run, error = %e, "session failed");
        }
    }
}

fn finish(result: TailResult<SessionOutcome>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_benign() => Ok(()),
        Err(e) => Err(anyhow::Error::new(e).context("Tailing failed")),
    }
}
