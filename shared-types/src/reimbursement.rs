use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One persisted reimbursement row: the total for one employee in one month.
///
/// `month` is stored in the `"YYYY年M月"` form used everywhere in the system.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ReimbursementRecord {
    pub id: i64,
    pub employee_name: String,
    pub amount: f64,
    pub account_number: String,
    pub bank_branch: String,
    pub note: Option<String>,
    pub month: String,
    pub created_at: i64,
}

impl ReimbursementRecord {
    /// Composite key used to correlate aggregate entries with persisted rows.
    pub fn composite_key(&self) -> String {
        format!("{}_{}", self.employee_name, self.month)
    }
}

/// Itemized expense row backing a `ReimbursementRecord` for one month.
/// Replaced wholesale per synced month, never patched row by row.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ReimbursementDetail {
    pub id: i64,
    pub employee_name: String,
    pub month: String,
    pub amount: f64,
    pub category: String,
    pub note: String,
    pub expense_date: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct MonthlySummary {
    pub month: String,
    pub total_amount: f64,
    pub record_count: i64,
}

#[derive(Debug, Deserialize, TS)]
pub struct CreateReimbursementRequest {
    pub employee_name: String,
    pub amount: f64,
    pub account_number: Option<String>,
    pub bank_branch: Option<String>,
    pub note: Option<String>,
    pub month: String,
}

/// Manual edit of a persisted record. Admin credentials are only required
/// when the record's month is write-protected.
#[derive(Debug, Deserialize, TS)]
pub struct UpdateReimbursementRequest {
    pub employee_name: Option<String>,
    pub amount: Option<f64>,
    pub note: Option<String>,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Default, Deserialize, TS)]
pub struct DeleteReimbursementRequest {
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct ReimbursementsResponse {
    pub reimbursements: Vec<ReimbursementRecord>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct ReimbursementDetailsResponse {
    pub details: Vec<ReimbursementDetail>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct MonthlySummariesResponse {
    pub summaries: Vec<MonthlySummary>,
}
