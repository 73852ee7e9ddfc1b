pub mod account_service;
pub mod dashboard;
pub mod incident_service;
pub mod permit_service;
pub mod subscription;
pub mod tenant_service;

pub use account_service::{AccountService, PermitParticipants};
pub use incident_service::{IncidentFilter, IncidentService, StatusUpdate};
pub use permit_service::{ActionRequest, PermitFilter, PermitService};
pub use tenant_service::{TenantList, TenantService};
