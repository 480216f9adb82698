use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Body of `POST /api/sync`. Every field is optional; missing ledger
/// parameters fall back to server configuration, and admin credentials are
/// only needed when the pass would mutate a protected month.
#[derive(Debug, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub app_token: Option<String>,
    pub table_id: Option<String>,
    pub access_token: Option<String>,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

/// Counts reported back to the caller after one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct SyncCounts {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
}

#[derive(Debug, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_auth: Option<bool>,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
}

#[derive(Debug, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTokenRequest {
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTokenResponse {
    pub access_token: String,
    pub expire_time: i64,
}
