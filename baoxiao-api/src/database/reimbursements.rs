use crate::database::AsyncDbConnection;
use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row};
use shared_types::ReimbursementRecord;

fn record_from_row(row: &Row) -> rusqlite::Result<ReimbursementRecord> {
    Ok(ReimbursementRecord {
        id: row.get(0)?,
        employee_name: row.get(1)?,
        amount: row.get(2)?,
        account_number: row.get(3)?,
        bank_branch: row.get(4)?,
        note: row.get(5)?,
        month: row.get(6)?,
        created_at: row.get(7)?,
    })
}

const RECORD_COLUMNS: &str =
    "id, employee_name, amount, account_number, bank_branch, note, month, created_at";

pub async fn list_all(conn: AsyncDbConnection) -> Result<Vec<ReimbursementRecord>> {
    let conn = conn.lock().await;

    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM reimbursements ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map([], record_from_row)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

pub async fn list_by_month(
    conn: AsyncDbConnection,
    month: &str,
) -> Result<Vec<ReimbursementRecord>> {
    let conn = conn.lock().await;

    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM reimbursements WHERE month = ?1 ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map([month], record_from_row)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

pub async fn get_record(
    conn: AsyncDbConnection,
    id: i64,
) -> Result<Option<ReimbursementRecord>> {
    let conn = conn.lock().await;

    let record = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM reimbursements WHERE id = ?1"),
            [id],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

pub async fn insert_record(conn: AsyncDbConnection, record: &ReimbursementRecord) -> Result<i64> {
    let conn = conn.lock().await;

    let id: i64 = conn.query_row(
        "INSERT INTO reimbursements
            (employee_name, amount, account_number, bank_branch, note, month, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) RETURNING id",
        params![
            record.employee_name,
            record.amount,
            record.account_number,
            record.bank_branch,
            record.note,
            record.month,
            record.created_at,
        ],
        |row| row.get(0),
    )?;

    Ok(id)
}

/// Amount refresh used by the reconciler; bank details ride along because
/// the external ledger may have learned them since the row was created.
pub async fn update_amount(
    conn: AsyncDbConnection,
    id: i64,
    amount: f64,
    account_number: &str,
    bank_branch: &str,
) -> Result<()> {
    let conn = conn.lock().await;

    conn.execute(
        "UPDATE reimbursements
            SET amount = ?1, account_number = ?2, bank_branch = ?3
            WHERE id = ?4",
        params![amount, account_number, bank_branch, id],
    )?;

    Ok(())
}

pub async fn update_fields(
    conn: AsyncDbConnection,
    id: i64,
    employee_name: Option<&str>,
    amount: Option<f64>,
    note: Option<&str>,
) -> Result<()> {
    let conn = conn.lock().await;

    conn.execute(
        "UPDATE reimbursements SET
            employee_name = COALESCE(?1, employee_name),
            amount = COALESCE(?2, amount),
            note = COALESCE(?3, note)
            WHERE id = ?4",
        params![employee_name, amount, note, id],
    )?;

    Ok(())
}

pub async fn delete_record(conn: AsyncDbConnection, id: i64) -> Result<()> {
    let conn = conn.lock().await;
    conn.execute("DELETE FROM reimbursements WHERE id = ?1", [id])?;
    Ok(())
}
