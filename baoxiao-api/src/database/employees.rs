use crate::database::AsyncDbConnection;
use anyhow::Result;
use rusqlite::params;
use shared_types::EmployeeInfo;
use std::collections::HashMap;

pub async fn list_employees(conn: AsyncDbConnection) -> Result<Vec<EmployeeInfo>> {
    let conn = conn.lock().await;

    let mut stmt = conn.prepare(
        "SELECT id, name, account_number, bank_branch FROM employees ORDER BY name ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(EmployeeInfo {
            id: row.get(0)?,
            name: row.get(1)?,
            account_number: row.get(2)?,
            bank_branch: row.get(3)?,
        })
    })?;

    let mut employees = Vec::new();
    for row in rows {
        employees.push(row?);
    }
    Ok(employees)
}

/// Name -> (account_number, bank_branch) lookup the reconciler uses to
/// enrich freshly inserted records.
pub async fn bank_info_by_name(conn: AsyncDbConnection) -> Result<HashMap<String, (String, String)>> {
    let employees = list_employees(conn).await?;
    Ok(employees
        .into_iter()
        .map(|e| (e.name, (e.account_number, e.bank_branch)))
        .collect())
}

pub async fn insert_employee(
    conn: AsyncDbConnection,
    name: &str,
    account_number: &str,
    bank_branch: &str,
) -> Result<i64> {
    let conn = conn.lock().await;

    let id: i64 = conn.query_row(
        "INSERT INTO employees (name, account_number, bank_branch)
            VALUES (?1, ?2, ?3) RETURNING id",
        params![name, account_number, bank_branch],
        |row| row.get(0),
    )?;

    Ok(id)
}

pub async fn delete_employee(conn: AsyncDbConnection, id: i64) -> Result<()> {
    let conn = conn.lock().await;
    conn.execute("DELETE FROM employees WHERE id = ?1", [id])?;
    Ok(())
}
