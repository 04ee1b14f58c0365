use chrono::NaiveDate;

use super::domain::{
    Customer, JobStatus, MaintenanceTicket, Record, ReviewStatus, StockRequest, Technician,
    TechnicianJob, TicketStatus,
};
use crate::store::{EntityKind, InMemoryEntityStore, Row};

pub const DEMO_CUSTOMER: &str = "customer@demo.com";
pub const DEMO_TECHNICIAN: &str = "tech@demo.com";
pub const SECOND_TECHNICIAN: &str = "maria.reyes@demo.com";
pub const DEMO_JOB: &str = "JOB-001";
pub const DEMO_TICKET: &str = "MT-00001";

fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, day).unwrap_or(NaiveDate::MIN)
}

/// Accounts and records the portals can log into and act on without a seed export.
pub fn demo_rows() -> Vec<(EntityKind, Row)> {
    let customer = Customer {
        email: DEMO_CUSTOMER.to_string(),
        full_name: "Juan Dela Cruz".to_string(),
        contact_no: Some("0917-555-0142".to_string()),
        address: Some("12 Mabini St, Quezon City".to_string()),
    };
    let technicians = [
        Technician {
            email: DEMO_TECHNICIAN.to_string(),
            full_name: "Carlo Santos".to_string(),
        },
        Technician {
            email: SECOND_TECHNICIAN.to_string(),
            full_name: "Maria Reyes".to_string(),
        },
    ];
    let ticket = MaintenanceTicket {
        ticket_id: DEMO_TICKET.to_string(),
        customer_email: customer.email.clone(),
        customer_name: customer.full_name.clone(),
        contact_no: customer.contact_no.clone(),
        site_address: customer.address.clone(),
        equipment: "Solar Panel 450W".to_string(),
        service_type: "Panel Cleaning".to_string(),
        schedule_date: day(12, 5),
        technician: DEMO_TECHNICIAN.to_string(),
        status: TicketStatus::Scheduled,
        notes: None,
    };
    let job = TechnicianJob {
        job_id: DEMO_JOB.to_string(),
        ticket_id: Some(ticket.ticket_id.clone()),
        technician_email: DEMO_TECHNICIAN.to_string(),
        customer_name: customer.full_name.clone(),
        address: customer.address.clone(),
        service_type: ticket.service_type.clone(),
        scheduled_date: ticket.schedule_date,
        scheduled_time: Some("10:00 AM".to_string()),
        priority: "Normal".to_string(),
        status: JobStatus::Pending,
    };
    let stock = [
        StockRequest {
            request_id: "REQ-001".to_string(),
            item_name: "Solar Panel 450W".to_string(),
            category: "Solar Panel".to_string(),
            quantity: 50,
            supplier: "SunTech Philippines".to_string(),
            request_date: day(12, 1),
            status: ReviewStatus::Pending,
            notes: Some("Urgent restock needed".to_string()),
        },
        StockRequest {
            request_id: "REQ-002".to_string(),
            item_name: "Battery 200Ah".to_string(),
            category: "Battery".to_string(),
            quantity: 20,
            supplier: "EcoPower Supply".to_string(),
            request_date: day(12, 2),
            status: ReviewStatus::Approved,
            notes: Some("For warehouse A".to_string()),
        },
    ];

    let mut rows = vec![(EntityKind::Customer, customer.to_row())];
    rows.extend(technicians.iter().map(|t| (EntityKind::Technician, t.to_row())));
    rows.push((EntityKind::MaintenanceTicket, ticket.to_row()));
    rows.push((EntityKind::TechnicianJob, job.to_row()));
    rows.extend(stock.iter().map(|r| (EntityKind::StockRequest, r.to_row())));
    rows
}

impl InMemoryEntityStore {
    pub fn with_demo_accounts() -> Self {
        Self::with_rows(demo_rows())
    }
}
