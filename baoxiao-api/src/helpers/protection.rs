use crate::config::AdminConfig;

/// Historical months whose persisted totals may not change without admin
/// authorization. Fixed range: March through November 2025.
const PROTECTED_MONTHS: &[&str] = &[
    "2025年3月",
    "2025年4月",
    "2025年5月",
    "2025年6月",
    "2025年7月",
    "2025年8月",
    "2025年9月",
    "2025年10月",
    "2025年11月",
];

/// Whether `month` (in `"YYYY年M月"` form) is write-protected. Reads are
/// never gated, only mutations.
pub fn is_protected_month(month: &str) -> bool {
    PROTECTED_MONTHS.contains(&month)
}

/// Check presented credentials against the configured admin pair.
pub fn verify_admin(admin: &AdminConfig, username: &str, password: &str) -> bool {
    username == admin.username && password == admin.password
}

pub fn protected_months_message() -> &'static str {
    "Historical data for 2025年3月 through 2025年11月 is protected; admin credentials are required to modify it"
}
