use crate::database::AsyncDbConnection;
use anyhow::Result;
use rusqlite::params;
use shared_types::{NormalizedDetail, ReimbursementDetail};

/// Replace every detail row stored for `month` with the freshly aggregated
/// ones. A full replace, not a merge: stale rows from an earlier pass must
/// not survive next to the new ones.
pub async fn replace_for_month(
    conn: AsyncDbConnection,
    month: &str,
    details: &[&NormalizedDetail],
) -> Result<usize> {
    let conn = conn.lock().await;
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "DELETE FROM reimbursement_details WHERE month = ?1",
        [month],
    )?;

    let mut stmt = conn.prepare(
        "INSERT INTO reimbursement_details
            (employee_name, month, amount, category, note, expense_date, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for detail in details {
        stmt.execute(params![
            detail.employee_name,
            month,
            detail.amount,
            detail.category,
            detail.note,
            detail.date,
            now,
        ])?;
    }

    Ok(details.len())
}

pub async fn list_for_employee_month(
    conn: AsyncDbConnection,
    employee_name: &str,
    month: &str,
) -> Result<Vec<ReimbursementDetail>> {
    let conn = conn.lock().await;

    let mut stmt = conn.prepare(
        "SELECT id, employee_name, month, amount, category, note, expense_date, created_at
            FROM reimbursement_details
            WHERE employee_name = ?1 AND month = ?2
            ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![employee_name, month], |row| {
        Ok(ReimbursementDetail {
            id: row.get(0)?,
            employee_name: row.get(1)?,
            month: row.get(2)?,
            amount: row.get(3)?,
            category: row.get(4)?,
            note: row.get(5)?,
            expense_date: row.get(6)?,
            created_at: row.get(7)?,
        })
    })?;

    let mut details = Vec::new();
    for row in rows {
        details.push(row?);
    }
    Ok(details)
}
