use crate::database::employees as employees_db;
use crate::database::monthly_summaries as summaries_db;
use crate::database::reimbursement_details as details_db;
use crate::database::reimbursements as records_db;
use crate::database::AsyncDbConnection;
use crate::helpers::protection::is_protected_month;
use extractors::month::{parse_month, MonthKey};
use shared_types::{AggregateEntry, NormalizedDetail, ReimbursementRecord, SyncCounts};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{error, info, warn};

/// Absolute tolerance for amount comparisons, at currency-minor-unit scale.
/// Avoids floating-point equality false negatives.
pub const AMOUNT_TOLERANCE: f64 = 0.01;

#[derive(Debug)]
pub struct AmountUpdate {
    pub id: i64,
    pub employee_name: String,
    pub month: String,
    pub amount: f64,
    pub account_number: String,
    pub bank_branch: String,
}

#[derive(Debug)]
pub struct Deletion {
    pub id: i64,
    pub employee_name: String,
    pub month: String,
}

/// Three-way diff of the aggregated external totals against existing local
/// records, computed before anything is committed.
#[derive(Debug, Default)]
pub struct SyncPlan {
    pub inserts: Vec<ReimbursementRecord>,
    pub updates: Vec<AmountUpdate>,
    pub deletions: Vec<Deletion>,
    /// Composite keys of protected-month mutations withheld for lack of
    /// valid admin credentials.
    pub skipped_protected: Vec<String>,
    /// Entries whose stored amount already matches within tolerance.
    pub skipped_unchanged: usize,
}

impl SyncPlan {
    pub fn has_mutations(&self) -> bool {
        !self.inserts.is_empty() || !self.updates.is_empty() || !self.deletions.is_empty()
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped_unchanged + self.skipped_protected.len()
    }
}

/// Outcome of one reconcile pass, for caller reporting.
#[derive(Debug)]
pub struct SyncOutcome {
    pub counts: SyncCounts,
    /// True when protected-month mutations were withheld and nothing else
    /// was applied: the caller should prompt for admin credentials and
    /// re-invoke the same sync with them attached.
    pub requires_auth: bool,
}

/// Diff `entries` against `existing`, producing insert/update/delete sets.
///
/// - a key absent from `existing` becomes an insert, enriched with bank
///   details from `bank_info` (empty strings for unknown employees);
/// - an existing amount differing by more than [`AMOUNT_TOLERANCE`] (or
///   stored as exactly zero) becomes an update;
/// - an existing key (month on/after `cutoff`) absent from `entries`
///   becomes a deletion, since the external ledger no longer has it.
///
/// Updates and deletions on protected months are withheld into
/// `skipped_protected` unless `authorized` is set. Months before `cutoff`
/// are never touched.
pub fn plan_sync(
    entries: &[AggregateEntry],
    existing: &[ReimbursementRecord],
    bank_info: &HashMap<String, (String, String)>,
    cutoff: MonthKey,
    authorized: bool,
    now: i64,
) -> SyncPlan {
    let existing_by_key: HashMap<String, &ReimbursementRecord> = existing
        .iter()
        .map(|r| (r.composite_key(), r))
        .collect();

    let mut plan = SyncPlan::default();

    for entry in entries {
        let key = entry.composite_key();
        let (account_number, bank_branch) = bank_info
            .get(&entry.employee_name)
            .cloned()
            .unwrap_or_default();

        match existing_by_key.get(&key) {
            None => {
                if bank_info.get(&entry.employee_name).is_none() {
                    warn!(employee = %entry.employee_name, "no bank details on file for new record");
                }
                plan.inserts.push(ReimbursementRecord {
                    id: 0,
                    employee_name: entry.employee_name.clone(),
                    amount: entry.total_amount,
                    account_number,
                    bank_branch,
                    // note left empty for manual annotation
                    note: None,
                    month: entry.month_key.clone(),
                    created_at: now,
                });
            }
            Some(record) => {
                let changed = record.amount == 0.0
                    || (record.amount - entry.total_amount).abs() > AMOUNT_TOLERANCE;
                if !changed {
                    plan.skipped_unchanged += 1;
                } else if is_protected_month(&entry.month_key) && !authorized {
                    plan.skipped_protected.push(key);
                } else {
                    plan.updates.push(AmountUpdate {
                        id: record.id,
                        employee_name: entry.employee_name.clone(),
                        month: entry.month_key.clone(),
                        amount: entry.total_amount,
                        account_number,
                        bank_branch,
                    });
                }
            }
        }
    }

    // Keys the external ledger no longer has, restricted to the synced
    // month range so pre-cutoff history is never pruned.
    let new_keys: HashSet<String> = entries.iter().map(|e| e.composite_key()).collect();
    for record in existing {
        let Some(month) = parse_month(&record.month) else {
            continue;
        };
        if month < cutoff || new_keys.contains(&record.composite_key()) {
            continue;
        }
        if is_protected_month(&record.month) && !authorized {
            plan.skipped_protected.push(record.composite_key());
        } else {
            plan.deletions.push(Deletion {
                id: record.id,
                employee_name: record.employee_name.clone(),
                month: record.month.clone(),
            });
        }
    }

    plan
}

pub struct SyncManager {
    db_conn: AsyncDbConnection,
}

impl SyncManager {
    pub fn new(db_conn: AsyncDbConnection) -> Self {
        Self { db_conn }
    }

    /// Run one reconcile pass: diff `entries` against the store, apply
    /// inserts then updates then deletions, replace itemized detail rows
    /// per synced month, and refresh monthly summaries.
    ///
    /// Each mutation commits independently: a failing row is logged and
    /// skipped from the counts without rolling back rows already applied,
    /// so the returned counts always reflect what actually committed.
    pub async fn reconcile(
        &self,
        entries: &[AggregateEntry],
        cutoff: MonthKey,
        authorized: bool,
    ) -> anyhow::Result<SyncOutcome> {
        let existing = records_db::list_all(self.db_conn.clone()).await?;
        let bank_info = employees_db::bank_info_by_name(self.db_conn.clone()).await?;
        let now = chrono::Utc::now().timestamp();

        let plan = plan_sync(entries, &existing, &bank_info, cutoff, authorized, now);
        info!(
            "Reconcile plan: {} inserts, {} updates, {} deletions, {} unchanged, {} protected",
            plan.inserts.len(),
            plan.updates.len(),
            plan.deletions.len(),
            plan.skipped_unchanged,
            plan.skipped_protected.len()
        );

        // Everything the pass would do is gated behind admin authorization:
        // apply nothing and tell the caller to re-invoke with credentials.
        if !plan.skipped_protected.is_empty() && !plan.has_mutations() {
            return Ok(SyncOutcome {
                counts: SyncCounts {
                    skipped: plan.skipped_total(),
                    ..SyncCounts::default()
                },
                requires_auth: true,
            });
        }

        let mut counts = SyncCounts {
            skipped: plan.skipped_total(),
            ..SyncCounts::default()
        };
        let mut touched_months: BTreeSet<String> = BTreeSet::new();

        for record in &plan.inserts {
            match records_db::insert_record(self.db_conn.clone(), record).await {
                Ok(_) => {
                    counts.inserted += 1;
                    touched_months.insert(record.month.clone());
                }
                Err(e) => {
                    error!(
                        "Failed to insert {} {}: {e}",
                        record.employee_name, record.month
                    );
                }
            }
        }

        for update in &plan.updates {
            match records_db::update_amount(
                self.db_conn.clone(),
                update.id,
                update.amount,
                &update.account_number,
                &update.bank_branch,
            )
            .await
            {
                Ok(()) => {
                    counts.updated += 1;
                    touched_months.insert(update.month.clone());
                }
                Err(e) => {
                    error!(
                        "Failed to update {} {}: {e}",
                        update.employee_name, update.month
                    );
                }
            }
        }

        for deletion in &plan.deletions {
            match records_db::delete_record(self.db_conn.clone(), deletion.id).await {
                Ok(()) => {
                    counts.deleted += 1;
                    touched_months.insert(deletion.month.clone());
                }
                Err(e) => {
                    error!(
                        "Failed to delete {} {}: {e}",
                        deletion.employee_name, deletion.month
                    );
                }
            }
        }

        self.replace_details(entries, cutoff, authorized).await;

        for month in &touched_months {
            if let Err(e) = summaries_db::refresh_summary(self.db_conn.clone(), month).await {
                error!("Failed to refresh summary for {month}: {e}");
            }
        }

        Ok(SyncOutcome {
            counts,
            requires_auth: false,
        })
    }

    /// Wholesale replacement of detail rows for every month this pass
    /// covered. Protected months are excluded unless authorized, matching
    /// the gating applied to their totals.
    async fn replace_details(&self, entries: &[AggregateEntry], cutoff: MonthKey, authorized: bool) {
        let mut details_by_month: HashMap<&str, Vec<&NormalizedDetail>> = HashMap::new();
        for entry in entries {
            details_by_month
                .entry(entry.month_key.as_str())
                .or_default()
                .extend(entry.details.iter());
        }

        for (month, details) in details_by_month {
            let in_range = parse_month(month).map_or(false, |m| m >= cutoff);
            if !in_range || (is_protected_month(month) && !authorized) {
                continue;
            }
            match details_db::replace_for_month(self.db_conn.clone(), month, &details).await {
                Ok(count) => info!("Replaced {count} detail rows for {month}"),
                Err(e) => error!("Failed to replace detail rows for {month}: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(employee: &str, month: &str, amounts: &[f64]) -> AggregateEntry {
        let details: Vec<NormalizedDetail> = amounts
            .iter()
            .map(|&amount| NormalizedDetail {
                employee_name: employee.to_string(),
                date: "1764950400000".to_string(),
                category: "差旅".to_string(),
                amount,
                note: String::new(),
                month_key: month.to_string(),
            })
            .collect();
        AggregateEntry {
            employee_name: employee.to_string(),
            month_key: month.to_string(),
            total_amount: amounts.iter().sum(),
            details,
        }
    }

    fn record(id: i64, employee: &str, month: &str, amount: f64) -> ReimbursementRecord {
        ReimbursementRecord {
            id,
            employee_name: employee.to_string(),
            amount,
            account_number: String::new(),
            bank_branch: String::new(),
            note: None,
            month: month.to_string(),
            created_at: 0,
        }
    }

    const CUTOFF: MonthKey = MonthKey {
        year: 2025,
        month: 12,
    };

    #[test]
    fn test_insert_enriched_with_bank_info() {
        let mut bank_info = HashMap::new();
        bank_info.insert(
            "蒋坤洪".to_string(),
            ("6228 4800".to_string(), "农业银行武汉藏龙岛支行".to_string()),
        );

        let entries = vec![
            entry("蒋坤洪", "2025年12月", &[100.0, 50.0]),
            entry("新同事", "2025年12月", &[10.0]),
        ];
        let plan = plan_sync(&entries, &[], &bank_info, CUTOFF, false, 0);

        assert_eq!(plan.inserts.len(), 2);
        assert_eq!(plan.inserts[0].amount, 150.0);
        assert_eq!(plan.inserts[0].account_number, "6228 4800");
        // unknown employee defaults to empty bank details
        assert_eq!(plan.inserts[1].account_number, "");
        assert_eq!(plan.inserts[1].bank_branch, "");
        assert!(plan.updates.is_empty());
        assert!(plan.deletions.is_empty());
    }

    #[test]
    fn test_tolerance_boundary() {
        let existing = vec![record(1, "徐荣", "2025年12月", 100.0)];
        let bank_info = HashMap::new();

        // within the 0.01 tolerance: no update
        let plan = plan_sync(
            &[entry("徐荣", "2025年12月", &[100.005])],
            &existing,
            &bank_info,
            CUTOFF,
            false,
            0,
        );
        assert!(plan.updates.is_empty());
        assert_eq!(plan.skipped_unchanged, 1);

        // beyond the tolerance: update
        let plan = plan_sync(
            &[entry("徐荣", "2025年12月", &[100.02])],
            &existing,
            &bank_info,
            CUTOFF,
            false,
            0,
        );
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].amount, 100.02);
    }

    #[test]
    fn test_zero_amount_always_updates() {
        // an existing zero is a placeholder, not a meaningful prior value
        let existing = vec![record(1, "李宇航", "2025年11月", 0.0)];
        let plan = plan_sync(
            &[entry("李宇航", "2025年11月", &[5000.0])],
            &existing,
            &HashMap::new(),
            MonthKey::new(2025, 11),
            true,
            0,
        );
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].amount, 5000.0);
    }

    #[test]
    fn test_protected_update_skipped_without_authorization() {
        let existing = vec![record(1, "李宇航", "2025年6月", 10263.0)];
        let entries = vec![entry("李宇航", "2025年6月", &[99999.0])];

        let plan = plan_sync(
            &entries,
            &existing,
            &HashMap::new(),
            MonthKey::new(2025, 6),
            false,
            0,
        );
        assert!(plan.updates.is_empty());
        assert_eq!(plan.skipped_protected, vec!["李宇航_2025年6月".to_string()]);
        assert!(!plan.has_mutations());

        // with valid credentials the same diff goes through
        let plan = plan_sync(
            &entries,
            &existing,
            &HashMap::new(),
            MonthKey::new(2025, 6),
            true,
            0,
        );
        assert_eq!(plan.updates.len(), 1);
        assert!(plan.skipped_protected.is_empty());
    }

    #[test]
    fn test_deletion_of_keys_absent_from_ledger() {
        let existing = vec![
            record(1, "徐荣", "2025年12月", 1800.0),
            record(2, "刘国华", "2025年12月", 355.9),
            // pre-cutoff history is never pruned
            record(3, "徐荣", "2025年2月", 73.3),
        ];
        let plan = plan_sync(
            &[entry("徐荣", "2025年12月", &[1800.0])],
            &existing,
            &HashMap::new(),
            CUTOFF,
            false,
            0,
        );

        assert_eq!(plan.deletions.len(), 1);
        assert_eq!(plan.deletions[0].id, 2);
        assert_eq!(plan.skipped_unchanged, 1);
    }

    #[test]
    fn test_protected_deletion_requires_authorization() {
        let existing = vec![record(1, "朱帆", "2025年11月", 2469.78)];

        let plan = plan_sync(&[], &existing, &HashMap::new(), MonthKey::new(2025, 11), false, 0);
        assert!(plan.deletions.is_empty());
        assert_eq!(plan.skipped_protected.len(), 1);

        let plan = plan_sync(&[], &existing, &HashMap::new(), MonthKey::new(2025, 11), true, 0);
        assert_eq!(plan.deletions.len(), 1);
    }

    #[test]
    fn test_matching_state_plans_nothing() {
        let existing = vec![
            record(1, "徐荣", "2025年12月", 1800.0),
            record(2, "蒋坤洪", "2025年12月", 150.0),
        ];
        let entries = vec![
            entry("徐荣", "2025年12月", &[1800.0]),
            entry("蒋坤洪", "2025年12月", &[100.0, 50.0]),
        ];

        let plan = plan_sync(&entries, &existing, &HashMap::new(), CUTOFF, false, 0);
        assert!(!plan.has_mutations());
        assert_eq!(plan.skipped_unchanged, 2);
        assert!(plan.skipped_protected.is_empty());
    }

    mod with_store {
        use super::*;
        use crate::database::Database;

        async fn test_db() -> (tempfile::TempDir, std::sync::Arc<Database>) {
            let dir = tempfile::tempdir().unwrap();
            let db = Database::new(&dir.path().join("test.db")).unwrap();
            (dir, std::sync::Arc::new(db))
        }

        #[tokio::test]
        async fn test_reconcile_is_idempotent() {
            let (_dir, db) = test_db().await;
            let manager = SyncManager::new(db.async_connection.clone());

            employees_db::insert_employee(
                db.async_connection.clone(),
                "蒋坤洪",
                "6228 4800",
                "农业银行武汉藏龙岛支行",
            )
            .await
            .unwrap();

            let entries = vec![
                entry("蒋坤洪", "2025年12月", &[100.0, 50.0]),
                entry("徐荣", "2025年12月", &[1800.0]),
            ];

            let first = manager.reconcile(&entries, CUTOFF, false).await.unwrap();
            assert_eq!(first.counts.inserted, 2);
            assert!(!first.requires_auth);

            // unchanged ledger: the second pass mutates nothing
            let second = manager.reconcile(&entries, CUTOFF, false).await.unwrap();
            assert_eq!(second.counts.inserted, 0);
            assert_eq!(second.counts.updated, 0);
            assert_eq!(second.counts.deleted, 0);
            assert_eq!(second.counts.skipped, 2);

            let records = records_db::list_all(db.async_connection.clone()).await.unwrap();
            assert_eq!(records.len(), 2);
            let stephen = records
                .iter()
                .find(|r| r.employee_name == "蒋坤洪")
                .unwrap();
            assert_eq!(stephen.amount, 150.0);
            assert_eq!(stephen.account_number, "6228 4800");

            let details = details_db::list_for_employee_month(
                db.async_connection.clone(),
                "蒋坤洪",
                "2025年12月",
            )
            .await
            .unwrap();
            assert_eq!(details.len(), 2);

            let summaries = summaries_db::list_summaries(db.async_connection.clone())
                .await
                .unwrap();
            assert_eq!(summaries.len(), 1);
            assert_eq!(summaries[0].total_amount, 1950.0);
            assert_eq!(summaries[0].record_count, 2);
        }

        #[tokio::test]
        async fn test_protected_only_pass_requires_auth_and_applies_nothing() {
            let (_dir, db) = test_db().await;
            let manager = SyncManager::new(db.async_connection.clone());

            let seeded = record_with(db.async_connection.clone(), "李宇航", "2025年6月", 10263.0).await;

            let entries = vec![entry("李宇航", "2025年6月", &[20000.0])];
            let outcome = manager
                .reconcile(&entries, MonthKey::new(2025, 6), false)
                .await
                .unwrap();

            assert!(outcome.requires_auth);
            assert_eq!(outcome.counts, SyncCounts {
                inserted: 0,
                updated: 0,
                deleted: 0,
                skipped: 1,
            });

            // the protected record is untouched
            let after = records_db::get_record(db.async_connection.clone(), seeded)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(after.amount, 10263.0);

            // and no detail rows sneaked in for the protected month
            let details = details_db::list_for_employee_month(
                db.async_connection.clone(),
                "李宇航",
                "2025年6月",
            )
            .await
            .unwrap();
            assert!(details.is_empty());

            // re-invoking with authorization applies the withheld update
            let outcome = manager
                .reconcile(&entries, MonthKey::new(2025, 6), true)
                .await
                .unwrap();
            assert!(!outcome.requires_auth);
            assert_eq!(outcome.counts.updated, 1);
            let after = records_db::get_record(db.async_connection.clone(), seeded)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(after.amount, 20000.0);
        }

        #[tokio::test]
        async fn test_prune_removes_rows_gone_from_ledger() {
            let (_dir, db) = test_db().await;
            let manager = SyncManager::new(db.async_connection.clone());

            record_with(db.async_connection.clone(), "徐荣", "2025年12月", 1800.0).await;
            record_with(db.async_connection.clone(), "刘国华", "2025年12月", 355.9).await;

            let entries = vec![entry("徐荣", "2025年12月", &[1800.0])];
            let outcome = manager.reconcile(&entries, CUTOFF, false).await.unwrap();

            assert_eq!(outcome.counts.deleted, 1);
            let records = records_db::list_all(db.async_connection.clone()).await.unwrap();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].employee_name, "徐荣");
        }

        async fn record_with(
            conn: AsyncDbConnection,
            employee: &str,
            month: &str,
            amount: f64,
        ) -> i64 {
            records_db::insert_record(conn, &record(0, employee, month, amount))
                .await
                .unwrap()
        }
    }
}
