pub mod approval;
pub mod identity;
