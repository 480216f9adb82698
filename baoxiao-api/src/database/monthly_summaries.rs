use crate::database::AsyncDbConnection;
use anyhow::Result;
use rusqlite::params;
use shared_types::MonthlySummary;

/// Recompute the summary row for one month from the reimbursements table
/// and upsert it. Called after every mutation that touches the month.
pub async fn refresh_summary(conn: AsyncDbConnection, month: &str) -> Result<()> {
    let conn = conn.lock().await;
    let now = chrono::Utc::now().timestamp();

    let (total_amount, record_count): (f64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0.0), COUNT(*)
            FROM reimbursements WHERE month = ?1",
        [month],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    conn.execute(
        "INSERT INTO monthly_summaries (month, total_amount, record_count, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (month) DO UPDATE SET
                total_amount = excluded.total_amount,
                record_count = excluded.record_count,
                updated_at = excluded.updated_at",
        params![month, total_amount, record_count, now],
    )?;

    Ok(())
}

pub async fn list_summaries(conn: AsyncDbConnection) -> Result<Vec<MonthlySummary>> {
    let conn = conn.lock().await;

    let mut stmt = conn.prepare(
        "SELECT month, total_amount, record_count FROM monthly_summaries ORDER BY month ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(MonthlySummary {
            month: row.get(0)?,
            total_amount: row.get(1)?,
            record_count: row.get(2)?,
        })
    })?;

    let mut summaries = Vec::new();
    for row in rows {
        summaries.push(row?);
    }
    Ok(summaries)
}
