use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{
    Customer, CustomerIssue, IssueStatus, JobStatus, MaintenanceTicket, Record, ReviewStatus,
    Severity, StockRequest, Technician, TechnicianApplication, TechnicianJob, TicketStatus,
    PENDING_ASSIGNMENT,
};
use crate::store::{EntityKind, EntityStore, Row, RowFilter, StoreError, WriteOp};
use crate::sync::{
    ChangeEvent, DeliveryReport, Notifier, PortalKind, ProjectionName, SessionKey, Target,
};

const TICKET_PREFIX: &str = "MT-";
const JOB_PREFIX: &str = "JOB-";
const ISSUE_PREFIX: &str = "ISS-";
const REQUEST_PREFIX: &str = "REQ-";

/// A committed write and what propagation did with it.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub record: T,
    pub delivery: DeliveryReport,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceRequest {
    pub equipment: String,
    pub service_type: String,
    pub schedule_date: NaiveDate,
    #[serde(default)]
    pub contact_no: Option<String>,
    #[serde(default)]
    pub site_address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TechnicianAssignment {
    pub technician_email: String,
    #[serde(default)]
    pub scheduled_time: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueReport {
    pub equipment: String,
    pub description: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueResolution {
    pub resolution: String,
    #[serde(default)]
    pub resolved_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StockRequestDraft {
    pub item_name: String,
    pub category: String,
    pub quantity: u32,
    pub supplier: String,
    #[serde(default)]
    pub request_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<ReviewStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TechnicianApplicationDraft {
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug)]
struct Sequences {
    ticket: AtomicU64,
    job: AtomicU64,
    issue: AtomicU64,
    request: AtomicU64,
}

impl Sequences {
    /// Starts every counter at the highest numeric suffix already stored under its prefix.
    fn resume<S: EntityStore>(store: &S) -> Self {
        let resume_at = |kind, prefix, segments| {
            AtomicU64::new(highest_suffix(store, kind, prefix, segments))
        };
        Self {
            ticket: resume_at(EntityKind::MaintenanceTicket, TICKET_PREFIX, 1),
            job: resume_at(EntityKind::TechnicianJob, JOB_PREFIX, 2),
            issue: resume_at(EntityKind::CustomerIssue, ISSUE_PREFIX, 1),
            request: resume_at(EntityKind::StockRequest, REQUEST_PREFIX, 1),
        }
    }

    fn next(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Largest trailing number among ids shaped `<prefix><segments dash-separated parts>`.
fn highest_suffix<S: EntityStore>(
    store: &S,
    kind: EntityKind,
    prefix: &str,
    segments: usize,
) -> u64 {
    let rows = match store.load_rows(kind, &RowFilter::All) {
        Ok(rows) => rows,
        Err(err) => {
            warn!(%kind, error = %err, "existing ids unreadable; sequence starts at zero");
            return 0;
        }
    };
    rows.iter()
        .filter_map(|row| {
            let parts: Vec<&str> = row.id.strip_prefix(prefix)?.split('-').collect();
            if parts.len() != segments {
                return None;
            }
            parts.last()?.parse::<u64>().ok()
        })
        .max()
        .unwrap_or(0)
}

/// Write side of the portals. Every flow writes first and only propagates on success.
pub struct ServiceDesk<S> {
    store: Arc<S>,
    notifier: Notifier,
    sequences: Sequences,
}

impl<S> ServiceDesk<S>
where
    S: EntityStore + 'static,
{
    pub fn new(store: Arc<S>, notifier: Notifier) -> Self {
        let sequences = Sequences::resume(store.as_ref());
        Self {
            store,
            notifier,
            sequences,
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn submit_maintenance_request(
        &self,
        customer_email: &str,
        request: MaintenanceRequest,
    ) -> Result<Outcome<MaintenanceTicket>, DeskError> {
        let customer: Customer = self.account(customer_email)?;
        let equipment = required(&request.equipment, "equipment")?;
        let service_type = required(&request.service_type, "service_type")?;

        let ticket = self.insert_next(
            &self.sequences.ticket,
            |n| format!("{TICKET_PREFIX}{n:05}"),
            |ticket_id| MaintenanceTicket {
                ticket_id,
                customer_email: customer.email.clone(),
                customer_name: customer.full_name.clone(),
                contact_no: request.contact_no.clone().or_else(|| customer.contact_no.clone()),
                site_address: request
                    .site_address
                    .clone()
                    .or_else(|| customer.address.clone()),
                equipment: equipment.clone(),
                service_type: service_type.clone(),
                schedule_date: request.schedule_date,
                technician: PENDING_ASSIGNMENT.to_string(),
                status: TicketStatus::Pending,
                notes: request.notes.clone(),
            },
        )?;

        let event = ChangeEvent::new(
            EntityKind::MaintenanceTicket,
            &ticket.ticket_id,
            "New maintenance request",
        )
        .with_status(ticket.status.label())
        .detail("Customer", &ticket.customer_name)
        .detail("Equipment", &ticket.equipment)
        .detail("Service", &ticket.service_type)
        .target(customer_target(&ticket.customer_email, ProjectionName::MaintenanceRequests).quiet())
        .target(Target::current(
            PortalKind::AdminDashboard,
            ProjectionName::MaintenanceTickets,
        ));

        Ok(self.propagate(ticket, &event))
    }

    /// Creates the technician's job for a ticket and schedules the ticket.
    pub fn approve_maintenance(
        &self,
        ticket_id: &str,
        assignment: TechnicianAssignment,
    ) -> Result<Outcome<TechnicianJob>, DeskError> {
        let technician_email = assignment.technician_email.trim();
        if technician_email.is_empty() || technician_email == PENDING_ASSIGNMENT {
            return Err(DeskError::InvalidTechnician(technician_email.to_string()));
        }
        let technician: Technician = self.account(technician_email)?;
        let ticket: MaintenanceTicket = self.load(ticket_id)?;

        let digits: String = ticket.ticket_id.chars().filter(char::is_ascii_digit).collect();
        let job = self.insert_next(
            &self.sequences.job,
            |n| format!("{JOB_PREFIX}{digits}-{n:02}"),
            |job_id| TechnicianJob {
                job_id,
                ticket_id: Some(ticket.ticket_id.clone()),
                technician_email: technician.email.clone(),
                customer_name: ticket.customer_name.clone(),
                address: ticket.site_address.clone(),
                service_type: ticket.service_type.clone(),
                scheduled_date: ticket.schedule_date,
                scheduled_time: assignment.scheduled_time.clone(),
                priority: "Normal".to_string(),
                status: JobStatus::Pending,
            },
        )?;

        let mut update = Row::new(&ticket.ticket_id)
            .with("technician", &technician.email)
            .with("status", TicketStatus::Scheduled.label());
        if let Some(notes) = assignment.notes.as_deref() {
            update = update.with("notes", notes);
        }
        // The job is already committed, so a failed ticket update only drops the ticket event.
        let scheduled = match self
            .store
            .write(EntityKind::MaintenanceTicket, WriteOp::Update, update)
        {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    ticket = %ticket.ticket_id,
                    job = %job.job_id,
                    error = %err,
                    "ticket not scheduled after job creation"
                );
                false
            }
        };

        let job_event = ChangeEvent::new(EntityKind::TechnicianJob, &job.job_id, "New job assigned")
            .with_status(job.status.label())
            .detail("Customer", &job.customer_name)
            .detail("Service", &job.service_type)
            .detail("Schedule", job.scheduled_date.to_string())
            .target(technician_target(&job.technician_email, ProjectionName::Jobs));
        let mut delivery = self.notifier.propagate(&job_event);

        if scheduled {
            let ticket_event = ChangeEvent::new(
                EntityKind::MaintenanceTicket,
                &ticket.ticket_id,
                "Maintenance scheduled",
            )
            .with_status(TicketStatus::Scheduled.label())
            .detail("Technician", &technician.full_name)
            .detail("Schedule", ticket.schedule_date.to_string())
            .target(customer_target(
                &ticket.customer_email,
                ProjectionName::MaintenanceRequests,
            ))
            .target(
                Target::current(PortalKind::AdminDashboard, ProjectionName::MaintenanceTickets)
                    .quiet(),
            );
            delivery.merge(self.notifier.propagate(&ticket_event));
        }

        info!(
            ticket = %ticket.ticket_id,
            job = %job.job_id,
            technician = %technician.email,
            "maintenance approved"
        );
        Ok(Outcome {
            record: job,
            delivery,
        })
    }

    pub fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
    ) -> Result<Outcome<TechnicianJob>, DeskError> {
        self.write_job_status(job_id, status, true)
    }

    fn write_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        announce: bool,
    ) -> Result<Outcome<TechnicianJob>, DeskError> {
        let mut job: TechnicianJob = self.load(job_id)?;
        self.store.write(
            EntityKind::TechnicianJob,
            WriteOp::Update,
            Row::new(&job.job_id).with("status", status.label()),
        )?;
        job.status = status;

        let mut target = technician_target(&job.technician_email, ProjectionName::Jobs);
        if !announce {
            target = target.quiet();
        }
        let event = ChangeEvent::new(EntityKind::TechnicianJob, &job.job_id, "Job status updated")
            .with_status(status.label())
            .detail("Customer", &job.customer_name)
            .target(target);

        Ok(self.propagate(job, &event))
    }

    /// Marks a technician's job completed and closes the linked ticket when there is one.
    /// The completing technician's job list refreshes without a message.
    pub fn complete_job(
        &self,
        technician_email: &str,
        job_id: &str,
    ) -> Result<Outcome<TechnicianJob>, DeskError> {
        let job: TechnicianJob = self.load(job_id)?;
        if job.technician_email != technician_email {
            return Err(DeskError::NotAssigned {
                job_id: job.job_id,
                technician: technician_email.to_string(),
            });
        }

        let mut outcome = self.write_job_status(job_id, JobStatus::Completed, false)?;

        if let Some(ticket_id) = job.ticket_id.as_deref() {
            match self.close_ticket(ticket_id, &job) {
                Ok(report) => outcome.delivery.merge(report),
                Err(err) => warn!(
                    job = %job.job_id,
                    ticket = ticket_id,
                    error = %err,
                    "linked ticket not closed after job completion"
                ),
            }
        }

        Ok(outcome)
    }

    fn close_ticket(&self, ticket_id: &str, job: &TechnicianJob) -> Result<DeliveryReport, DeskError> {
        self.store.write(
            EntityKind::MaintenanceTicket,
            WriteOp::Update,
            Row::new(ticket_id)
                .with("status", TicketStatus::Completed.label())
                .with("notes", "Job completed by technician"),
        )?;

        // Jobs only carry the customer's display name.
        let customer = self
            .store
            .resolve_id(EntityKind::Customer, "full_name", &job.customer_name)?;
        if customer.is_none() {
            debug!(customer = %job.customer_name, "customer name did not resolve to one account");
        }

        let event = ChangeEvent::new(
            EntityKind::MaintenanceTicket,
            ticket_id,
            "Maintenance completed",
        )
        .with_status(TicketStatus::Completed.label())
        .detail("Job", &job.job_id)
        .detail("Service", &job.service_type)
        .target_opt(
            customer.map(|key| customer_target(&key, ProjectionName::MaintenanceRequests)),
        )
        .target(
            Target::current(PortalKind::AdminDashboard, ProjectionName::MaintenanceTickets)
                .quiet(),
        );

        Ok(self.notifier.propagate(&event))
    }

    pub fn delete_maintenance_ticket(
        &self,
        ticket_id: &str,
    ) -> Result<Outcome<MaintenanceTicket>, DeskError> {
        let ticket: MaintenanceTicket = self.load(ticket_id)?;
        self.store.write(
            EntityKind::MaintenanceTicket,
            WriteOp::Delete,
            Row::new(&ticket.ticket_id),
        )?;

        let event = ChangeEvent::new(
            EntityKind::MaintenanceTicket,
            &ticket.ticket_id,
            "Maintenance ticket deleted",
        )
        .target(customer_target(&ticket.customer_email, ProjectionName::MaintenanceRequests).quiet())
        .target(
            Target::current(PortalKind::AdminDashboard, ProjectionName::MaintenanceTickets)
                .quiet(),
        );

        Ok(self.propagate(ticket, &event))
    }

    pub fn report_issue(
        &self,
        customer_email: &str,
        report: IssueReport,
    ) -> Result<Outcome<CustomerIssue>, DeskError> {
        let customer: Customer = self.account(customer_email)?;
        let equipment = required(&report.equipment, "equipment")?;
        let description = required(&report.description, "description")?;
        let today = Local::now().date_naive();

        let issue = self.insert_next(
            &self.sequences.issue,
            |n| format!("{ISSUE_PREFIX}{n:05}"),
            |issue_id| CustomerIssue {
                issue_id,
                customer_email: customer.email.clone(),
                customer_name: customer.full_name.clone(),
                equipment: equipment.clone(),
                description: description.clone(),
                severity: report.severity,
                reported_on: today,
                status: IssueStatus::Open,
                assigned_technician: None,
                resolution: None,
                resolved_on: None,
            },
        )?;

        let event = ChangeEvent::new(EntityKind::CustomerIssue, &issue.issue_id, "Issue reported")
            .with_status(issue.status.label())
            .target(customer_target(&issue.customer_email, ProjectionName::Issues).quiet());

        Ok(self.propagate(issue, &event))
    }

    pub fn assign_issue(
        &self,
        technician_email: &str,
        issue_id: &str,
    ) -> Result<Outcome<CustomerIssue>, DeskError> {
        let technician: Technician = self.account(technician_email)?;
        let mut issue: CustomerIssue = self.load(issue_id)?;

        self.store.write(
            EntityKind::CustomerIssue,
            WriteOp::Update,
            Row::new(&issue.issue_id)
                .with("status", IssueStatus::InProgress.label())
                .with("assigned_technician", &technician.email),
        )?;
        issue.status = IssueStatus::InProgress;
        issue.assigned_technician = Some(technician.email.clone());

        let event = self.issue_event(&issue, &technician, "Issue assigned");
        Ok(self.propagate(issue, &event))
    }

    pub fn resolve_issue(
        &self,
        technician_email: &str,
        issue_id: &str,
        resolution: IssueResolution,
    ) -> Result<Outcome<CustomerIssue>, DeskError> {
        let text = resolution.resolution.trim();
        if text.is_empty() {
            return Err(DeskError::MissingResolution);
        }
        let technician: Technician = self.account(technician_email)?;
        let mut issue: CustomerIssue = self.load(issue_id)?;
        let resolved_on = resolution
            .resolved_on
            .unwrap_or_else(|| Local::now().date_naive());

        self.store.write(
            EntityKind::CustomerIssue,
            WriteOp::Update,
            Row::new(&issue.issue_id)
                .with("status", IssueStatus::Resolved.label())
                .with("assigned_technician", &technician.email)
                .with("resolution", text)
                .with("resolved_on", super::domain::format_date(resolved_on)),
        )?;
        issue.status = IssueStatus::Resolved;
        issue.assigned_technician = Some(technician.email.clone());
        issue.resolution = Some(text.to_string());
        issue.resolved_on = Some(resolved_on);

        let event = self
            .issue_event(&issue, &technician, "Issue resolved")
            .detail("Resolution", text);
        Ok(self.propagate(issue, &event))
    }

    pub fn submit_stock_request(
        &self,
        draft: StockRequestDraft,
    ) -> Result<Outcome<StockRequest>, DeskError> {
        let item_name = required(&draft.item_name, "item_name")?;
        let category = required(&draft.category, "category")?;
        let supplier = required(&draft.supplier, "supplier")?;
        if draft.quantity == 0 {
            return Err(DeskError::InvalidQuantity);
        }
        let request_date = draft
            .request_date
            .unwrap_or_else(|| Local::now().date_naive());

        let request = self.insert_next(
            &self.sequences.request,
            |n| format!("{REQUEST_PREFIX}{n:03}"),
            |request_id| StockRequest {
                request_id,
                item_name: item_name.clone(),
                category: category.clone(),
                quantity: draft.quantity,
                supplier: supplier.clone(),
                request_date,
                status: draft.status.unwrap_or(ReviewStatus::Pending),
                notes: draft.notes.clone(),
            },
        )?;

        let event = ChangeEvent::new(
            EntityKind::StockRequest,
            &request.request_id,
            "New stock request",
        )
        .with_status(request.status.label())
        .detail("Item", &request.item_name)
        .detail("Quantity", request.quantity.to_string())
        .detail("Supplier", &request.supplier)
        .target(Target::current(
            PortalKind::AdminDashboard,
            ProjectionName::StockRequests,
        ))
        .target(Target::current(PortalKind::CompanyAdmin, ProjectionName::StockRequests).quiet());

        Ok(self.propagate(request, &event))
    }

    pub fn submit_technician_application(
        &self,
        draft: TechnicianApplicationDraft,
    ) -> Result<Outcome<TechnicianApplication>, DeskError> {
        let application = TechnicianApplication {
            email: required(&draft.email, "email")?,
            full_name: required(&draft.full_name, "full_name")?,
            notes: draft.notes,
            applied_on: Local::now().date_naive(),
            status: ReviewStatus::Pending,
        };
        self.store
            .write(EntityKind::TechnicianApplication, WriteOp::Insert, application.to_row())?;

        let event = ChangeEvent::new(
            EntityKind::TechnicianApplication,
            &application.email,
            "New technician application",
        )
        .with_status(application.status.label())
        .detail("Name", &application.full_name)
        .target(Target::current(
            PortalKind::AdminDashboard,
            ProjectionName::TechnicianApplications,
        ));

        Ok(self.propagate(application, &event))
    }

    fn issue_event(
        &self,
        issue: &CustomerIssue,
        technician: &Technician,
        title: &str,
    ) -> ChangeEvent {
        ChangeEvent::new(EntityKind::CustomerIssue, &issue.issue_id, title)
            .with_status(issue.status.label())
            .detail("Equipment", &issue.equipment)
            .detail("Technician", &technician.full_name)
            .target(technician_target(&technician.email, ProjectionName::CustomerIssues).quiet())
            .target(customer_target(&issue.customer_email, ProjectionName::Issues))
    }

    fn propagate<T>(&self, record: T, event: &ChangeEvent) -> Outcome<T> {
        let delivery = self.notifier.propagate(event);
        debug!(
            entity = %event.entity,
            id = %event.entity_id,
            targets = event.targets.len(),
            delivered = delivery.delivered(),
            "write propagated"
        );
        Outcome { record, delivery }
    }

    fn load<T: Record>(&self, id: &str) -> Result<T, DeskError> {
        let row = self
            .store
            .fetch(T::KIND, id)?
            .ok_or_else(|| StoreError::NotFound {
                kind: T::KIND,
                id: id.to_string(),
            })?;
        Ok(T::from_row(&row)?)
    }

    fn account<T: Record>(&self, key: &str) -> Result<T, DeskError> {
        match self.store.fetch(T::KIND, key)? {
            Some(row) => Ok(T::from_row(&row)?),
            None => Err(DeskError::UnknownAccount {
                kind: T::KIND,
                key: key.to_string(),
            }),
        }
    }

    /// Inserts under the next free sequence id, skipping ids already taken in the store.
    fn insert_next<T, I, B>(&self, counter: &AtomicU64, make_id: I, build: B) -> Result<T, DeskError>
    where
        T: Record,
        I: Fn(u64) -> String,
        B: Fn(String) -> T,
    {
        loop {
            let record = build(make_id(Sequences::next(counter)));
            match self.store.write(T::KIND, WriteOp::Insert, record.to_row()) {
                Ok(()) => {
                    debug!(kind = %T::KIND, id = record.id(), "record inserted");
                    return Ok(record);
                }
                Err(StoreError::Conflict { id, .. }) => {
                    debug!(kind = %T::KIND, %id, "id already taken; trying next");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

fn customer_target(email: &str, projection: ProjectionName) -> Target {
    Target::session(PortalKind::Customer, SessionKey::new(email), projection)
}

fn technician_target(email: &str, projection: ProjectionName) -> Target {
    Target::session(PortalKind::Technician, SessionKey::new(email), projection)
}

fn required(value: &str, field: &'static str) -> Result<String, DeskError> {
    let value = value.trim();
    if value.is_empty() {
        Err(DeskError::MissingField(field))
    } else {
        Ok(value.to_string())
    }
}

/// Error raised by the service desk. Nothing is propagated when a flow fails.
#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no {kind} account is registered for {key}")]
    UnknownAccount { kind: EntityKind, key: String },
    #[error("'{0}' is not an assignable technician")]
    InvalidTechnician(String),
    #[error("job {job_id} is not assigned to {technician}")]
    NotAssigned { job_id: String, technician: String },
    #[error("a resolution is required to resolve an issue")]
    MissingResolution,
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("quantity must be greater than zero")]
    InvalidQuantity,
}
