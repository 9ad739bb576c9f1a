pub mod approvals;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod payment;

pub use approvals::{ApprovalStore, InMemoryApprovalStore};
pub use domain::approval::{ApprovalSnapshot, DecisionOutcome, PendingRequest, Verdict};
pub use domain::identity::{Identity, Profile};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{DialogEngine, DialogTransitionError};
pub use payment::{extract_identifiers, format_payment_lines};
