use super::common::*;
use std::sync::Arc;

use crate::store::{EntityKind, EntityStore, Row, StoreError, WriteOp};
use crate::sync::{DeliveryOutcome, PortalKind, ProjectionName, SessionConfig};
use crate::workflows::{
    DeskError, IssueResolution, IssueStatus, JobStatus, Portal, ReviewStatus,
    TechnicianApplicationDraft, TicketStatus, PENDING_ASSIGNMENT,
};

#[tokio::test]
async fn maintenance_request_alerts_the_current_admin() {
    let (_, portal) = portal();
    let admin = open(&portal, PortalKind::AdminDashboard, "admin").await;
    let customer = open(&portal, PortalKind::Customer, DEMO_CUSTOMER).await;

    let outcome = portal
        .desk()
        .submit_maintenance_request(DEMO_CUSTOMER, maintenance_request())
        .expect("request accepted");

    // MT-00001 already exists in the demo data.
    assert_eq!(outcome.record.ticket_id, "MT-00002");
    assert_eq!(outcome.record.status, TicketStatus::Pending);
    assert_eq!(outcome.record.technician, PENDING_ASSIGNMENT);
    assert_eq!(
        outcome.record.site_address.as_deref(),
        Some("12 Mabini St, Quezon City")
    );
    assert_eq!(outcome.delivery.delivered(), 2);

    settle(&admin).await;
    settle(&customer).await;
    let admin_messages = portal.messages().announcements_for(admin.address());
    assert_eq!(admin_messages.len(), 1);
    assert_eq!(admin_messages[0].title, "New maintenance request");
    assert!(portal
        .messages()
        .announcements_for(customer.address())
        .is_empty());
    assert_eq!(
        cached_status(&customer, ProjectionName::MaintenanceRequests, "MT-00002").await,
        Some("Pending".to_string())
    );
}

#[test]
fn maintenance_request_requires_a_known_customer() {
    let (_, portal) = portal();

    match portal
        .desk()
        .submit_maintenance_request("stranger@demo.com", maintenance_request())
    {
        Err(DeskError::UnknownAccount { kind, key }) => {
            assert_eq!(kind, EntityKind::Customer);
            assert_eq!(key, "stranger@demo.com");
        }
        other => panic!("expected unknown account, got {other:?}"),
    }
}

#[test]
fn approval_rejects_placeholder_technicians() {
    let (store, portal) = portal();

    for technician in ["", "  ", PENDING_ASSIGNMENT] {
        match portal
            .desk()
            .approve_maintenance(DEMO_TICKET, assignment(technician))
        {
            Err(DeskError::InvalidTechnician(_)) => {}
            other => panic!("expected invalid technician, got {other:?}"),
        }
    }
    assert_eq!(store.count(EntityKind::TechnicianJob), 1);
}

#[tokio::test]
async fn approval_creates_job_and_schedules_ticket() {
    let (store, portal) = portal();
    let ticket = portal
        .desk()
        .submit_maintenance_request(DEMO_CUSTOMER, maintenance_request())
        .expect("request accepted")
        .record;
    let technician = open(&portal, PortalKind::Technician, SECOND_TECHNICIAN).await;
    let customer = open(&portal, PortalKind::Customer, DEMO_CUSTOMER).await;

    let outcome = portal
        .desk()
        .approve_maintenance(&ticket.ticket_id, assignment(SECOND_TECHNICIAN))
        .expect("approval succeeds");

    assert_eq!(outcome.record.job_id, "JOB-00002-01");
    assert_eq!(outcome.record.ticket_id.as_deref(), Some("MT-00002"));
    assert_eq!(outcome.record.status, JobStatus::Pending);

    let row = stored(&store, EntityKind::MaintenanceTicket, &ticket.ticket_id);
    assert_eq!(row.get("status"), Some("Scheduled"));
    assert_eq!(row.get("technician"), Some(SECOND_TECHNICIAN));

    settle(&technician).await;
    settle(&customer).await;
    assert_eq!(
        cached_status(&technician, ProjectionName::Jobs, "JOB-00002-01").await,
        Some("Pending".to_string())
    );
    let technician_messages = portal.messages().announcements_for(technician.address());
    assert_eq!(technician_messages.len(), 1);
    assert_eq!(technician_messages[0].title, "New job assigned");
    let customer_messages = portal.messages().announcements_for(customer.address());
    assert_eq!(customer_messages.len(), 1);
    assert_eq!(customer_messages[0].title, "Maintenance scheduled");
}

#[tokio::test]
async fn failed_ticket_schedule_still_reports_the_created_job() {
    let store = Arc::new(TicketUpdatesFail::demo());
    let portal = Portal::new(Arc::clone(&store), SessionConfig::default());
    let technician = open(&portal, PortalKind::Technician, SECOND_TECHNICIAN).await;
    let customer = open(&portal, PortalKind::Customer, DEMO_CUSTOMER).await;

    let outcome = portal
        .desk()
        .approve_maintenance(DEMO_TICKET, assignment(SECOND_TECHNICIAN))
        .expect("job creation stands without the ticket update");

    assert_eq!(outcome.record.job_id, "JOB-00001-01");
    assert_eq!(outcome.delivery.deliveries.len(), 1);
    assert!(store
        .fetch(EntityKind::TechnicianJob, "JOB-00001-01")
        .expect("fetch")
        .is_some());
    let ticket = store
        .fetch(EntityKind::MaintenanceTicket, DEMO_TICKET)
        .expect("fetch")
        .expect("ticket present");
    assert_eq!(ticket.get("technician"), Some(DEMO_TECHNICIAN));
    assert_eq!(ticket.get("status"), Some("Scheduled"));

    settle(&technician).await;
    settle(&customer).await;
    let technician_messages = portal.messages().announcements_for(technician.address());
    assert_eq!(technician_messages.len(), 1);
    assert_eq!(technician_messages[0].title, "New job assigned");
    assert!(portal
        .messages()
        .announcements_for(customer.address())
        .is_empty());
}

#[test]
fn job_ids_continue_after_stored_ones() {
    let store = demo_store();
    store
        .write(
            EntityKind::TechnicianJob,
            WriteOp::Insert,
            Row::new("JOB-00001-05").with("status", "Pending"),
        )
        .expect("job stored");
    let portal = Portal::new(store, SessionConfig::default());

    let outcome = portal
        .desk()
        .approve_maintenance(DEMO_TICKET, assignment(SECOND_TECHNICIAN))
        .expect("approval succeeds");

    assert_eq!(outcome.record.job_id, "JOB-00001-06");
}

#[tokio::test]
async fn completing_a_job_closes_its_ticket_for_the_customer() {
    let (store, portal) = portal();
    let technician = open(&portal, PortalKind::Technician, DEMO_TECHNICIAN).await;
    let customer = open(&portal, PortalKind::Customer, DEMO_CUSTOMER).await;

    let outcome = portal
        .desk()
        .complete_job(DEMO_TECHNICIAN, DEMO_JOB)
        .expect("job completes");

    assert_eq!(outcome.record.status, JobStatus::Completed);
    let ticket = stored(&store, EntityKind::MaintenanceTicket, DEMO_TICKET);
    assert_eq!(ticket.get("status"), Some("Completed"));
    assert_eq!(ticket.get("notes"), Some("Job completed by technician"));

    settle(&technician).await;
    settle(&customer).await;
    assert_eq!(
        cached_status(&technician, ProjectionName::Jobs, DEMO_JOB).await,
        Some("Completed".to_string())
    );
    assert_eq!(
        cached_status(&customer, ProjectionName::MaintenanceRequests, DEMO_TICKET).await,
        Some("Completed".to_string())
    );
    let messages = portal.messages().announcements_for(customer.address());
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].title, "Maintenance completed");

    assert!(portal
        .messages()
        .announcements_for(technician.address())
        .is_empty());
    assert_eq!(
        portal
            .messages()
            .render_count(technician.address(), ProjectionName::Jobs),
        2
    );
}

#[test]
fn completing_someone_elses_job_is_refused() {
    let (store, portal) = portal();

    match portal.desk().complete_job(SECOND_TECHNICIAN, DEMO_JOB) {
        Err(DeskError::NotAssigned { job_id, technician }) => {
            assert_eq!(job_id, DEMO_JOB);
            assert_eq!(technician, SECOND_TECHNICIAN);
        }
        other => panic!("expected not assigned, got {other:?}"),
    }
    let job = stored(&store, EntityKind::TechnicianJob, DEMO_JOB);
    assert_eq!(job.get("status"), Some("Pending"));
}

#[tokio::test]
async fn ambiguous_customer_names_are_not_notified() {
    let (store, portal) = portal();
    store
        .write(
            EntityKind::Customer,
            WriteOp::Insert,
            Row::new("juan.other@demo.com").with("full_name", "Juan Dela Cruz"),
        )
        .expect("second customer inserted");
    let customer = open(&portal, PortalKind::Customer, DEMO_CUSTOMER).await;

    let outcome = portal
        .desk()
        .complete_job(DEMO_TECHNICIAN, DEMO_JOB)
        .expect("job completes");

    settle(&customer).await;
    assert!(portal
        .messages()
        .announcements_for(customer.address())
        .is_empty());
    assert!(outcome
        .delivery
        .deliveries
        .iter()
        .all(|delivery| delivery.session.as_ref() != Some(customer.address())));
    let ticket = stored(&store, EntityKind::MaintenanceTicket, DEMO_TICKET);
    assert_eq!(ticket.get("status"), Some("Completed"));
}

#[tokio::test]
async fn failed_writes_notify_nobody() {
    let store = Arc::new(ReadOnlyStore::demo());
    let portal = Portal::new(store, SessionConfig::default());
    let technician = open(&portal, PortalKind::Technician, DEMO_TECHNICIAN).await;

    match portal
        .desk()
        .update_job_status(DEMO_JOB, JobStatus::Completed)
    {
        Err(DeskError::Store(StoreError::Unavailable(_))) => {}
        other => panic!("expected store failure, got {other:?}"),
    }

    settle(&technician).await;
    assert_eq!(portal.messages().announcement_count(), 0);
    assert_eq!(
        portal
            .messages()
            .render_count(technician.address(), ProjectionName::Jobs),
        1
    );
}

#[tokio::test]
async fn issue_assignment_and_resolution_reach_the_customer() {
    let (store, portal) = portal();
    let customer = open(&portal, PortalKind::Customer, DEMO_CUSTOMER).await;
    let technician = open(&portal, PortalKind::Technician, DEMO_TECHNICIAN).await;

    let issue = portal
        .desk()
        .report_issue(DEMO_CUSTOMER, issue_report())
        .expect("issue reported")
        .record;
    assert_eq!(issue.issue_id, "ISS-00001");
    assert_eq!(issue.status, IssueStatus::Open);

    portal
        .desk()
        .assign_issue(DEMO_TECHNICIAN, &issue.issue_id)
        .expect("issue assigned");
    let resolved = portal
        .desk()
        .resolve_issue(
            DEMO_TECHNICIAN,
            &issue.issue_id,
            IssueResolution {
                resolution: "Replaced faulty cell".to_string(),
                resolved_on: None,
            },
        )
        .expect("issue resolved");

    assert_eq!(resolved.record.status, IssueStatus::Resolved);
    assert_eq!(
        resolved.record.assigned_technician.as_deref(),
        Some(DEMO_TECHNICIAN)
    );
    let row = stored(&store, EntityKind::CustomerIssue, &issue.issue_id);
    assert_eq!(row.get("resolution"), Some("Replaced faulty cell"));

    settle(&customer).await;
    settle(&technician).await;
    let titles: Vec<String> = portal
        .messages()
        .announcements_for(customer.address())
        .into_iter()
        .map(|message| message.title)
        .collect();
    assert_eq!(titles, ["Issue assigned", "Issue resolved"]);
    assert!(portal
        .messages()
        .announcements_for(technician.address())
        .is_empty());
    assert_eq!(
        cached_status(&technician, ProjectionName::CustomerIssues, &issue.issue_id).await,
        Some("Resolved".to_string())
    );
}

#[test]
fn resolution_text_is_required() {
    let (_, portal) = portal();

    match portal.desk().resolve_issue(
        DEMO_TECHNICIAN,
        "ISS-00001",
        IssueResolution {
            resolution: "   ".to_string(),
            resolved_on: None,
        },
    ) {
        Err(DeskError::MissingResolution) => {}
        other => panic!("expected missing resolution, got {other:?}"),
    }
}

#[tokio::test]
async fn stock_requests_reach_both_admin_portals() {
    let (_, portal) = portal();
    let admin = open(&portal, PortalKind::AdminDashboard, "admin").await;
    let company = open(&portal, PortalKind::CompanyAdmin, "company-admin").await;

    let outcome = portal
        .desk()
        .submit_stock_request(stock_draft())
        .expect("stock request accepted");

    assert_eq!(outcome.record.request_id, "REQ-003");
    assert_eq!(outcome.record.status, ReviewStatus::Pending);
    assert_eq!(
        outcome.delivery.outcome_for(
            &crate::sync::Recipient::Current(PortalKind::CompanyAdmin),
            ProjectionName::StockRequests
        ),
        Some(DeliveryOutcome::Delivered)
    );

    settle(&admin).await;
    settle(&company).await;
    assert_eq!(portal.messages().announcements_for(admin.address()).len(), 1);
    assert!(portal
        .messages()
        .announcements_for(company.address())
        .is_empty());
    assert_eq!(
        cached_status(&company, ProjectionName::StockRequests, "REQ-003").await,
        Some("Pending".to_string())
    );
}

#[test]
fn stock_requests_need_a_positive_quantity() {
    let (_, portal) = portal();
    let mut draft = stock_draft();
    draft.quantity = 0;

    assert!(matches!(
        portal.desk().submit_stock_request(draft),
        Err(DeskError::InvalidQuantity)
    ));
}

#[test]
fn duplicate_technician_applications_conflict() {
    let (_, portal) = portal();
    let draft = TechnicianApplicationDraft {
        email: "new.tech@demo.com".to_string(),
        full_name: "Ramon Lopez".to_string(),
        notes: Some("5 years solar installs".to_string()),
    };

    let first = portal
        .desk()
        .submit_technician_application(draft.clone())
        .expect("application accepted");
    assert_eq!(first.record.status, ReviewStatus::Pending);
    assert_eq!(
        first.delivery.deliveries[0].outcome,
        DeliveryOutcome::Absent
    );

    match portal.desk().submit_technician_application(draft) {
        Err(DeskError::Store(StoreError::Conflict { kind, .. })) => {
            assert_eq!(kind, EntityKind::TechnicianApplication);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn deleted_tickets_leave_the_customer_view() {
    let (_, portal) = portal();
    let customer = open(&portal, PortalKind::Customer, DEMO_CUSTOMER).await;

    portal
        .desk()
        .delete_maintenance_ticket(DEMO_TICKET)
        .expect("ticket deleted");
    settle(&customer).await;

    assert_eq!(
        cached_status(&customer, ProjectionName::MaintenanceRequests, DEMO_TICKET).await,
        None
    );
    assert!(matches!(
        portal.desk().delete_maintenance_ticket(DEMO_TICKET),
        Err(DeskError::Store(StoreError::NotFound { .. }))
    ));
}
