use clap::Args;
use energy_portal::error::AppError;
use energy_portal::store::InMemoryEntityStore;
use energy_portal::sync::{
    DeliveryReport, PortalKind, ProjectionName, SessionConfig, SessionHandle,
};
use energy_portal::workflows::demo::{
    DEMO_CUSTOMER, DEMO_JOB, DEMO_TECHNICIAN, DEMO_TICKET, SECOND_TECHNICIAN,
};
use energy_portal::workflows::{JobStatus, Portal, TechnicianAssignment};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Skip the scenario where the writer's peer has no open session.
    #[arg(long)]
    pub(crate) skip_absent: bool,
    /// Skip the scenario where a second login replaces the first in the registry.
    #[arg(long)]
    pub(crate) skip_overwrite: bool,
}

#[derive(Debug)]
pub(crate) struct ScenarioRun {
    pub(crate) title: &'static str,
    pub(crate) report: DeliveryReport,
    pub(crate) observations: Vec<String>,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    println!("Energy portal propagation demo");
    println!("Demo accounts: {DEMO_CUSTOMER}, {DEMO_TECHNICIAN}, {SECOND_TECHNICIAN}");

    for run in run_scenarios(&args).await? {
        render_scenario(&run);
    }
    Ok(())
}

pub(crate) async fn run_scenarios(args: &DemoArgs) -> Result<Vec<ScenarioRun>, AppError> {
    let mut runs = vec![registered_technician().await?];
    if !args.skip_absent {
        runs.push(absent_technician().await?);
    }
    if !args.skip_overwrite {
        runs.push(overwritten_customer().await?);
    }
    Ok(runs)
}

fn demo_portal() -> Portal<InMemoryEntityStore> {
    Portal::new(
        Arc::new(InMemoryEntityStore::with_demo_accounts()),
        SessionConfig::default(),
    )
}

async fn registered_technician() -> Result<ScenarioRun, AppError> {
    let portal = demo_portal();
    let technician = portal
        .host()
        .open(PortalKind::Technician, DEMO_TECHNICIAN)
        .await?;

    let outcome = portal
        .desk()
        .update_job_status(DEMO_JOB, JobStatus::Completed)?;
    let status = cached_status(&technician, ProjectionName::Jobs, DEMO_JOB).await?;

    Ok(ScenarioRun {
        title: "Job marked completed while its technician is logged in",
        report: outcome.delivery,
        observations: vec![
            format!("{DEMO_JOB} in {}: {status}", ProjectionName::Jobs),
            format!(
                "messages shown to {}: {}",
                technician.display_name(),
                portal.messages().announcements_for(technician.address()).len()
            ),
        ],
    })
}

async fn absent_technician() -> Result<ScenarioRun, AppError> {
    let portal = demo_portal();

    let outcome = portal
        .desk()
        .update_job_status(DEMO_JOB, JobStatus::InProgress)?;

    Ok(ScenarioRun {
        title: "Job updated with no technician session open",
        report: outcome.delivery,
        observations: vec![
            format!("store now holds {DEMO_JOB} as {}", outcome.record.status),
            format!(
                "messages shown anywhere: {}",
                portal.messages().announcement_count()
            ),
        ],
    })
}

async fn overwritten_customer() -> Result<ScenarioRun, AppError> {
    let portal = demo_portal();
    let first = portal.host().open(PortalKind::Customer, DEMO_CUSTOMER).await?;
    let second = portal.host().open(PortalKind::Customer, DEMO_CUSTOMER).await?;

    let outcome = portal.desk().approve_maintenance(
        DEMO_TICKET,
        TechnicianAssignment {
            technician_email: SECOND_TECHNICIAN.to_string(),
            scheduled_time: Some("2:00 PM".to_string()),
            notes: None,
        },
    )?;

    let mut observations = Vec::new();
    for (label, handle) in [("first", &first), ("second", &second)] {
        cached_status(handle, ProjectionName::MaintenanceRequests, DEMO_TICKET).await?;
        observations.push(format!(
            "{label} login (instance {}): {} message(s)",
            handle.instance(),
            portal.messages().announcements_for(handle.address()).len()
        ));
    }

    Ok(ScenarioRun {
        title: "Customer logs in twice before a ticket is scheduled",
        report: outcome.delivery,
        observations,
    })
}

/// Reads through the session's inbox, so earlier notifications are applied first.
async fn cached_status(
    handle: &SessionHandle,
    projection: ProjectionName,
    id: &str,
) -> Result<String, AppError> {
    let snapshot = handle.projection(projection).await?;
    Ok(snapshot
        .rows
        .iter()
        .find(|row| row.id == id)
        .and_then(|row| row.get("status"))
        .unwrap_or("missing")
        .to_string())
}

fn render_scenario(run: &ScenarioRun) {
    println!("\n{}", run.title);
    for delivery in &run.report.deliveries {
        let instance = delivery
            .instance
            .map(|instance| format!(" (instance {instance})"))
            .unwrap_or_default();
        println!(
            "- {} / {}: {}{}",
            delivery.target.recipient, delivery.target.projection, delivery.outcome, instance
        );
    }
    for observation in &run.observations {
        println!("  {observation}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use energy_portal::sync::DeliveryOutcome;

    #[tokio::test]
    async fn all_scenarios_run_by_default() {
        let runs = run_scenarios(&DemoArgs::default())
            .await
            .expect("scenarios run");
        assert_eq!(runs.len(), 3);

        assert_eq!(runs[0].report.deliveries[0].outcome, DeliveryOutcome::Delivered);
        assert!(runs[0].observations[0].ends_with("Completed"));
        assert!(runs[0].observations[1].ends_with(": 1"));

        assert!(runs[1]
            .report
            .deliveries
            .iter()
            .all(|delivery| delivery.outcome == DeliveryOutcome::Absent));
        assert!(runs[1].observations[1].ends_with(": 0"));

        assert!(runs[2].observations[0].ends_with("0 message(s)"));
        assert!(runs[2].observations[1].ends_with("1 message(s)"));
    }

    #[tokio::test]
    async fn skipped_scenarios_are_left_out() {
        let runs = run_scenarios(&DemoArgs {
            skip_absent: true,
            skip_overwrite: true,
        })
        .await
        .expect("scenarios run");
        assert_eq!(runs.len(), 1);
    }
}
