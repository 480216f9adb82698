use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Bank payout details for one employee, looked up by name when the
/// reconciler turns an aggregate entry into a persisted record.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct EmployeeInfo {
    pub id: i64,
    pub name: String,
    pub account_number: String,
    pub bank_branch: String,
}

#[derive(Debug, Deserialize, TS)]
pub struct CreateEmployeeRequest {
    pub name: String,
    pub account_number: Option<String>,
    pub bank_branch: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct EmployeesResponse {
    pub employees: Vec<EmployeeInfo>,
}
