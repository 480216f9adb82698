use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    // One row per employee per month; the reconciler relies on the
    // (employee_name, month) pair being unique.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS reimbursements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_name VARCHAR NOT NULL,
            amount DOUBLE NOT NULL,
            account_number VARCHAR NOT NULL DEFAULT '',
            bank_branch VARCHAR NOT NULL DEFAULT '',
            note VARCHAR,
            month VARCHAR NOT NULL,
            created_at BIGINT NOT NULL,
            UNIQUE (employee_name, month)
        )",
        [],
    )?;

    // Itemized rows backing a reimbursement for one month; replaced
    // wholesale per synced month.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS reimbursement_details (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            employee_name VARCHAR NOT NULL,
            month VARCHAR NOT NULL,
            amount DOUBLE NOT NULL,
            category VARCHAR NOT NULL DEFAULT '',
            note VARCHAR NOT NULL DEFAULT '',
            expense_date VARCHAR NOT NULL DEFAULT '',
            created_at BIGINT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS employees (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name VARCHAR NOT NULL UNIQUE,
            account_number VARCHAR NOT NULL DEFAULT '',
            bank_branch VARCHAR NOT NULL DEFAULT ''
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS monthly_summaries (
            month VARCHAR PRIMARY KEY,
            total_amount DOUBLE NOT NULL,
            record_count INTEGER NOT NULL,
            updated_at BIGINT NOT NULL
        )",
        [],
    )?;

    // Create indexes for performance
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_reimbursements_month
            ON reimbursements (month)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_details_month
            ON reimbursement_details (month)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_details_employee_month
            ON reimbursement_details (employee_name, month)",
        [],
    )?;

    Ok(())
}
