use serde::{Deserialize, Serialize};

pub mod employee;
pub mod ledger;
pub mod reimbursement;
pub mod sync;

pub use employee::{CreateEmployeeRequest, EmployeeInfo, EmployeesResponse};
pub use ledger::{AggregateEntry, NormalizedDetail, RawLedgerItem};
pub use reimbursement::{
    CreateReimbursementRequest, DeleteReimbursementRequest, MonthlySummariesResponse,
    MonthlySummary, ReimbursementDetail, ReimbursementDetailsResponse, ReimbursementRecord,
    ReimbursementsResponse, UpdateReimbursementRequest,
};
pub use sync::{
    LedgerTokenRequest, LedgerTokenResponse, SyncCounts, SyncRequest, SyncResponse,
};

/// Error response for API endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
