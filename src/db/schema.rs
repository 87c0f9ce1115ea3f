//! DDL for the three persisted-state tables (spec §6).

use crate::db::error::DatabaseError;

/// Create the `nodes`, `properties` and `jobs` tables and their indexes,
/// idempotently. Mirrors the teacher's `initialize_schema` (WAL mode, busy
/// timeout, `CREATE TABLE IF NOT EXISTS`, no migrations).
pub async fn initialize(conn: &libsql::Connection) -> Result<(), DatabaseError> {
    execute(conn, "PRAGMA journal_mode = WAL", "enable WAL mode").await?;
    execute(conn, "PRAGMA busy_timeout = 5000", "set busy timeout").await?;

    execute(
        conn,
        "CREATE TABLE IF NOT EXISTS nodes (
            path TEXT PRIMARY KEY,
            node_type TEXT NOT NULL,
            busy INTEGER NOT NULL DEFAULT 0,
            owner TEXT,
            link_target TEXT,
            accepts_json TEXT NOT NULL DEFAULT '[]',
            provides_json TEXT NOT NULL DEFAULT '[]',
            capabilities_json TEXT NOT NULL DEFAULT '[]',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        "create nodes table",
    )
    .await?;

    execute(
        conn,
        "CREATE TABLE IF NOT EXISTS properties (
            node_path TEXT NOT NULL,
            uri TEXT NOT NULL,
            value TEXT,
            read_only INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (node_path, uri),
            FOREIGN KEY (node_path) REFERENCES nodes(path) ON DELETE CASCADE
        )",
        "create properties table",
    )
    .await?;

    execute(
        conn,
        "CREATE INDEX IF NOT EXISTS idx_properties_node_path ON properties(node_path)",
        "create properties index",
    )
    .await?;

    execute(
        conn,
        "CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            phase TEXT NOT NULL,
            transfer_xml TEXT NOT NULL,
            results_xml TEXT,
            created DATETIME DEFAULT CURRENT_TIMESTAMP,
            started DATETIME,
            ended DATETIME,
            error TEXT
        )",
        "create jobs table",
    )
    .await?;

    execute(
        conn,
        "CREATE INDEX IF NOT EXISTS idx_jobs_phase ON jobs(phase)",
        "create jobs phase index",
    )
    .await?;

    Ok(())
}

async fn execute(conn: &libsql::Connection, sql: &str, context: &str) -> Result<(), DatabaseError> {
    conn.execute(sql, ()).await.map_err(|e| DatabaseError::sql(context, e))?;
    Ok(())
}
