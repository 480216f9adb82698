use crate::field_value::{extract_number, extract_string};
use crate::month::{parse_month, MonthKey};
use shared_types::{AggregateEntry, NormalizedDetail, RawLedgerItem};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Column names that may carry the month, in lookup priority order.
pub const MONTH_FIELD_CANDIDATES: &[&str] = &["月份", "month", "Month", "日期月份", "归属月份"];

pub const EMPLOYEE_FIELD: &str = "支出人";
pub const AMOUNT_FIELD: &str = "金额";
pub const CATEGORY_FIELD: &str = "分类";
pub const NOTE_FIELD: &str = "支出说明";
pub const DATE_FIELD: &str = "日期";

/// Map known alternate spellings to the canonical employee name before any
/// keying or aggregation happens.
pub fn canonical_employee_name(raw: &str) -> &str {
    match raw {
        "Stephen" | "stephen" => "蒋坤洪",
        "lewis" | "Lewis" | "Lewis Li" | "lewis li" => "李宇航",
        other => other,
    }
}

/// Resolve the month of one raw item from the first non-empty candidate
/// column. `None` means the item carries no usable month.
pub fn resolve_month_key(item: &RawLedgerItem) -> Option<MonthKey> {
    for field_name in MONTH_FIELD_CANDIDATES {
        let value = extract_string(item.fields.get(*field_name));
        if !value.is_empty() {
            return parse_month(&value);
        }
    }
    None
}

/// Collapse byte-for-byte duplicate rows (same mapped employee, date,
/// amount, category and note), keeping the first occurrence of each key.
/// The remote source stores the same logical expense more than once when
/// upstream data entry duplicates it; this undoes that.
pub fn dedupe_items(items: Vec<RawLedgerItem>) -> Vec<RawLedgerItem> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(items.len());

    for item in items {
        let key = dedupe_key(&item);
        if seen.insert(key) {
            kept.push(item);
        }
    }

    kept
}

fn dedupe_key(item: &RawLedgerItem) -> String {
    let employee =
        canonical_employee_name(&extract_string(item.fields.get(EMPLOYEE_FIELD))).to_string();
    let date = extract_string(item.fields.get(DATE_FIELD));
    let amount = extract_number(item.fields.get(AMOUNT_FIELD));
    let category = extract_string(item.fields.get(CATEGORY_FIELD));
    let note = extract_string(item.fields.get(NOTE_FIELD));
    format!("{employee}|{date}|{amount}|{category}|{note}")
}

fn normalize_item(item: &RawLedgerItem) -> Option<NormalizedDetail> {
    let employee_name =
        canonical_employee_name(&extract_string(item.fields.get(EMPLOYEE_FIELD))).to_string();
    if employee_name.is_empty() {
        warn!(record_id = %item.record_id, "dropping ledger row without an employee name");
        return None;
    }

    let Some(month) = resolve_month_key(item) else {
        warn!(
            record_id = %item.record_id,
            employee = %employee_name,
            "dropping ledger row with no resolvable month"
        );
        return None;
    };

    Some(NormalizedDetail {
        employee_name,
        date: extract_string(item.fields.get(DATE_FIELD)),
        category: extract_string(item.fields.get(CATEGORY_FIELD)),
        amount: extract_number(item.fields.get(AMOUNT_FIELD)),
        note: extract_string(item.fields.get(NOTE_FIELD)),
        month_key: month.to_string(),
    })
}

/// Group deduplicated rows by `(employee, month)`, summing amounts and
/// retaining every contributing detail row. Rows without an employee name
/// or resolvable month are dropped, not errored. Entries come back in
/// first-seen order.
pub fn aggregate_items(items: &[RawLedgerItem]) -> Vec<AggregateEntry> {
    let mut entries: Vec<AggregateEntry> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for item in items {
        let Some(detail) = normalize_item(item) else {
            continue;
        };

        let key = format!("{}_{}", detail.employee_name, detail.month_key);
        match index_by_key.get(&key) {
            Some(&i) => {
                entries[i].total_amount += detail.amount;
                entries[i].details.push(detail);
            }
            None => {
                index_by_key.insert(key, entries.len());
                entries.push(AggregateEntry {
                    employee_name: detail.employee_name.clone(),
                    month_key: detail.month_key.clone(),
                    total_amount: detail.amount,
                    details: vec![detail],
                });
            }
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(employee: &str, month: &str, amount: f64, category: &str, note: &str) -> RawLedgerItem {
        let fields = json!({
            EMPLOYEE_FIELD: employee,
            "月份": month,
            AMOUNT_FIELD: amount,
            CATEGORY_FIELD: category,
            NOTE_FIELD: note,
            DATE_FIELD: "1764950400000",
        });
        RawLedgerItem {
            record_id: "rec".to_string(),
            fields: fields.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_alias_aggregation_scenario() {
        // two rows for "Stephen" in 2025-12 must land on the canonical name
        let items = vec![
            item("Stephen", "2025-12", 100.0, "交通", ""),
            item("stephen", "2025-12", 50.0, "交通", "机场往返"),
        ];

        let entries = aggregate_items(&items);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].employee_name, "蒋坤洪");
        assert_eq!(entries[0].month_key, "2025年12月");
        assert_eq!(entries[0].total_amount, 150.0);
        assert_eq!(entries[0].details.len(), 2);
        assert_eq!(entries[0].composite_key(), "蒋坤洪_2025年12月");
    }

    #[test]
    fn test_sum_invariant() {
        let items = vec![
            item("李宇航", "2025-12", 1200.5, "差旅", ""),
            item("李宇航", "2025-12", 88.3, "餐饮", ""),
            item("徐荣", "2025-12", 507.0, "办公", ""),
            item("李宇航", "2026-1", 42.0, "差旅", ""),
        ];

        for entry in aggregate_items(&items) {
            let detail_sum: f64 = entry.details.iter().map(|d| d.amount).sum();
            assert_eq!(entry.total_amount, detail_sum);
        }
    }

    #[test]
    fn test_groups_split_by_month() {
        let items = vec![
            item("徐荣", "2025-12", 100.0, "办公", ""),
            item("徐荣", "2026-1", 200.0, "办公", ""),
        ];

        let entries = aggregate_items(&items);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].month_key, "2025年12月");
        assert_eq!(entries[1].month_key, "2026年1月");
    }

    #[test]
    fn test_drops_rows_without_month_or_employee() {
        let items = vec![
            item("徐荣", "月份未知", 100.0, "办公", ""),
            item("", "2025-12", 50.0, "办公", ""),
            item("徐荣", "2025-12", 25.0, "办公", ""),
        ];

        let entries = aggregate_items(&items);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].total_amount, 25.0);
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let mut duplicate = item("刘国华", "2025-12", 355.9, "交通", "打车");
        duplicate.record_id = "rec_dup".to_string();

        let items = vec![
            item("刘国华", "2025-12", 355.9, "交通", "打车"),
            duplicate,
            item("刘国华", "2025-12", 355.9, "交通", "地铁"),
        ];

        let kept = dedupe_items(items);
        assert_eq!(kept.len(), 2);
        // first instance of the duplicated key survives
        assert_eq!(kept[0].record_id, "rec");
        let notes: Vec<String> = kept
            .iter()
            .map(|i| extract_string(i.fields.get(NOTE_FIELD)))
            .collect();
        assert_eq!(notes, vec!["打车", "地铁"]);
    }

    #[test]
    fn test_dedupe_applies_alias_mapping() {
        let items = vec![
            item("Stephen", "2025-12", 100.0, "交通", ""),
            item("蒋坤洪", "2025-12", 100.0, "交通", ""),
        ];

        // after alias mapping these are the same logical expense
        assert_eq!(dedupe_items(items).len(), 1);
    }

    #[test]
    fn test_resolve_month_prefers_candidates_in_order() {
        let fields = json!({
            "month": "2025-11",
            "归属月份": "2025-12",
        });
        let raw = RawLedgerItem {
            record_id: "rec".to_string(),
            fields: fields.as_object().cloned().unwrap(),
        };
        assert_eq!(resolve_month_key(&raw), Some(MonthKey::new(2025, 11)));
    }

    #[test]
    fn test_wrapped_field_shapes_aggregate() {
        let fields = json!({
            EMPLOYEE_FIELD: [{"name": "汪慧灵", "id": "ou_9"}],
            "月份": {"type": 1, "value": [{"text": "2025-12", "type": "text"}]},
            AMOUNT_FIELD: 288.0,
            CATEGORY_FIELD: {"text": "行政"},
            NOTE_FIELD: "",
        });
        let raw = RawLedgerItem {
            record_id: "rec_w".to_string(),
            fields: fields.as_object().cloned().unwrap(),
        };

        let entries = aggregate_items(&[raw]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].employee_name, "汪慧灵");
        assert_eq!(entries[0].total_amount, 288.0);
        assert_eq!(entries[0].details[0].category, "行政");
    }
}
