use crate::output::UserOutput;
use devdeck::orchestrator::FleetReport;
use devdeck::{Orchestrator, ServiceOutcome};
use tokio_util::sync::CancellationToken;

/// Start the requested services, monitor them until Ctrl-C, then stop the fleet.
pub async fn run_up(
    orchestrator: &Orchestrator,
    services: &[String],
    profile: Option<&str>,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let interrupted = CancellationToken::new();
    let ctrl_c = {
        let interrupted = interrupted.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => interrupted.cancel(),
                Err(e) => tracing::error!("Cannot listen for Ctrl-C: {}", e),
            }
        })
    };

    let started = match (profile, services.is_empty()) {
        (Some(profile), _) => orchestrator.start_profile_with(profile, &interrupted).await,
        (None, true) => orchestrator.start_all_with(&interrupted).await,
        (None, false) => orchestrator.start_services_with(services, &interrupted).await,
    };
    let report = match started {
        Ok(report) => report,
        Err(e) => {
            ctrl_c.abort();
            return Err(e.into());
        }
    };

    render_report("Startup", &report, out);

    if !interrupted.is_cancelled() {
        orchestrator.spawn_health_monitor(orchestrator.settings().monitor_interval);
        out.status("Services are up. Press Ctrl-C to stop.");
        interrupted.cancelled().await;
    }

    out.blank();
    out.status("Stopping services...");
    orchestrator.shutdown().await;
    let stopped = orchestrator.stop_all().await?;
    render_report("Shutdown", &stopped, out);

    stopped.into_result()?;
    Ok(())
}

pub fn render_report(title: &str, report: &FleetReport, out: &dyn UserOutput) {
    out.status(&format!("{}:", title));
    for entry in &report.services {
        let line = match &entry.outcome {
            ServiceOutcome::Started => format!("  [started]  {}", entry.service),
            ServiceOutcome::Stopped => format!("  [stopped]  {}", entry.service),
            ServiceOutcome::AlreadyRunning => format!("  [running]  {}", entry.service),
            ServiceOutcome::Skipped { reason } => {
                format!("  [skipped]  {} ({})", entry.service, reason)
            }
            ServiceOutcome::Cancelled => format!("  [cancel]   {}", entry.service),
            ServiceOutcome::Failed { error } => {
                out.error(&format!("  [failed]   {}: {}", entry.service, error));
                continue;
            }
        };
        out.status(&line);
        for warning in &entry.warnings {
            out.warning(&format!("             {}", warning));
        }
    }

    let failed = report.failed();
    if !failed.is_empty() {
        out.warning(&format!(
            "{} service(s) did not complete: {}",
            failed.len(),
            failed.join(", ")
        ));
    }
}
