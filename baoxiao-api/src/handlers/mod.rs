pub mod employees;
pub mod reimbursements;
pub mod sync;
