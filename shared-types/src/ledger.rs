use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One row as returned by the external ledger: an opaque field bag keyed by
/// column name. Cell values may be plain scalars or nested wrapper shapes
/// (`{value: [{text}]}`, arrays, tagged objects); the extractors crate is
/// responsible for flattening them.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RawLedgerItem {
    #[serde(default)]
    pub record_id: String,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// One external expense row after field extraction, month resolution and
/// name-alias mapping. A row without a resolvable month never becomes one
/// of these: it is dropped before aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct NormalizedDetail {
    pub employee_name: String,
    /// External-native timestamp, kept as the string the ledger returned.
    pub date: String,
    pub category: String,
    pub amount: f64,
    pub note: String,
    /// Fully resolved `"YYYY年M月"` key.
    pub month_key: String,
}

/// Per-employee-per-month total together with the itemized rows that
/// produced it. Invariant: `total_amount` equals the sum of detail amounts.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AggregateEntry {
    pub employee_name: String,
    pub month_key: String,
    pub total_amount: f64,
    pub details: Vec<NormalizedDetail>,
}

impl AggregateEntry {
    pub fn composite_key(&self) -> String {
        format!("{}_{}", self.employee_name, self.month_key)
    }
}
