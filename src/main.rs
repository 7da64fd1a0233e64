mod cancel;
mod cli;
mod config;
mod coordinator;
mod error;
mod establish;
mod request;
mod server;
mod session;
mod state_machine;
mod status;
mod telemetry;
mod ui;
mod webdriver;
mod workflow;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use reqwest::Url;

use cli::{Cli, Command};
use config::ProvisionerConfig;
use coordinator::JobCoordinator;
use request::ProvisioningRequest;
use server::AppState;
use session::SessionProvider;
use state_machine::{JobOutcome, JobPlan};
use status::Notifier;
use ui::JobProgress;
use webdriver::{BrowserOptions, WebDriver};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = ProvisionerConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.webdriver_url {
        config.webdriver_url = url.clone();
    }
    if cli.headed {
        config.headless = false;
    }
    telemetry::init_telemetry(config.log_format, cli.verbose)?;
    config.validate()?;

    let options = BrowserOptions {
        headless: config.headless,
        ..Default::default()
    };
    let provider = WebDriver::with_base_url(
        config.webdriver_url.clone(),
        options,
        config.timings.action_timeout(),
    );
    let jobs = Arc::new(JobCoordinator::new(
        provider,
        config.router_url.clone(),
        config.timings.clone(),
        Notifier::new(),
    ));

    match cli.command {
        Command::Serve { port } => {
            let state = Arc::new(AppState {
                jobs,
                credentials: config.credentials(),
                hostname_prefix: config.hostname_prefix.clone(),
            });
            server::serve(state, port.unwrap_or(config.port)).await
        }
        Command::Provision {
            hostname,
            ssid,
            psk,
            notify,
        } => {
            let hostname = format!("{}{hostname}", config.hostname_prefix);
            let request = ProvisioningRequest::new(config.credentials(), &hostname, &ssid, &psk)?;
            let notify = notify
                .map(|raw| Url::parse(&raw))
                .transpose()
                .context("invalid --notify URL")?;
            let description = format!("provision {hostname}");
            run_foreground(&jobs, JobPlan::Provision(request), notify, &description).await
        }
        Command::Reset { yes } => {
            if !yes {
                bail!("factory reset erases the router configuration; pass --yes to confirm");
            }
            let plan = JobPlan::FactoryReset(config.credentials());
            run_foreground(&jobs, plan, None, "factory reset").await
        }
    }
}

/// Run one job with a progress bar. Ctrl-C asks the job to stop.
async fn run_foreground<P: SessionProvider>(
    jobs: &Arc<JobCoordinator<P>>,
    plan: JobPlan,
    notify: Option<Url>,
    description: &str,
) -> Result<()> {
    let progress = JobProgress::start(description);
    let mut subscription = jobs.subscribe();
    let wait = jobs.submit(plan, notify)?.wait();
    tokio::pin!(wait);

    let mut cancel_sent = false;
    let report = loop {
        tokio::select! {
            report = &mut wait => break report?,
            event = subscription.receiver.recv() => {
                if let Ok(event) = event {
                    progress.handle(&event);
                }
            }
            _ = tokio::signal::ctrl_c(), if !cancel_sent => {
                cancel_sent = true;
                if jobs.cancel().is_ok() {
                    progress.cancelling();
                }
            }
        }
    };
    while let Ok(event) = subscription.receiver.try_recv() {
        progress.handle(&event);
    }

    progress.complete(&report);
    progress.print_report(&report);
    if report.outcome != JobOutcome::Success {
        bail!("job {}", report.outcome);
    }
    Ok(())
}
