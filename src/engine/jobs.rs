//! Jobs-table access (spec §4.C, §6): the UWS job record's persistence,
//! living alongside the `MetadataStore`'s `nodes`/`properties` tables in the
//! same database. Generalizes the row/struct assembly pattern in
//! [`crate::db::store`] to the `jobs` table.

use chrono::{DateTime, Utc};

use crate::db::DatabaseError;
use crate::model::job::{Job, Phase};
use crate::model::transfer::Protocol;

pub async fn insert(conn: &libsql::Connection, job: &Job) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO jobs (id, owner, phase, transfer_xml, results_xml, created, started, ended, error)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            job.id.as_str(),
            job.owner.as_str(),
            job.phase.to_string(),
            job.transfer_xml.as_str(),
            encode_results(&job.results)?,
            job.created_at.to_rfc3339(),
            job.started_at.map(|t| t.to_rfc3339()),
            job.ended_at.map(|t| t.to_rfc3339()),
            job.error.clone(),
        ),
    )
    .await
    .map_err(|e| DatabaseError::sql("insert job", e))?;
    Ok(())
}

pub async fn load(conn: &libsql::Connection, id: &str) -> Result<Option<Job>, DatabaseError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, owner, phase, transfer_xml, results_xml, created, started, ended, error
             FROM jobs WHERE id = ?",
        )
        .await
        .map_err(|e| DatabaseError::sql("prepare load job", e))?;
    let mut rows = stmt.query((id,)).await.map_err(|e| DatabaseError::sql("query load job", e))?;
    let Some(row) = rows.next().await.map_err(|e| DatabaseError::sql("step load job", e))? else {
        return Ok(None);
    };
    Ok(Some(row_to_job(&row)?))
}

/// Advance `phase`, stamping `started`/`ended` as given. `started` only ever
/// moves from NULL to a value (a job's first entry into `EXECUTING`), so a
/// later side-exit never clobbers it.
///
/// Terminal phases (`COMPLETED`/`ABORTED`/`ERROR`) are immutable (spec
/// §3.5): the `WHERE` clause only ever matches a row whose current phase is
/// non-terminal, so a worker racing a concurrent abort can never clobber a
/// phase the job has already left for good.
pub async fn update_phase(
    conn: &libsql::Connection,
    id: &str,
    phase: Phase,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    error: Option<&str>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE jobs SET phase = ?, started = COALESCE(started, ?), ended = COALESCE(?, ended), error = COALESCE(?, error)
         WHERE id = ? AND phase NOT IN ('COMPLETED', 'ABORTED', 'ERROR')",
        (
            phase.to_string(),
            started_at.map(|t| t.to_rfc3339()),
            ended_at.map(|t| t.to_rfc3339()),
            error,
            id,
        ),
    )
    .await
    .map_err(|e| DatabaseError::sql("update job phase", e))?;
    Ok(())
}

pub async fn update_results(
    conn: &libsql::Connection,
    id: &str,
    results: &[Protocol],
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE jobs SET results_xml = ? WHERE id = ?",
        (encode_results(results)?, id),
    )
    .await
    .map_err(|e| DatabaseError::sql("update job results", e))?;
    Ok(())
}

/// Jobs parked in `EXECUTING` — the set a startup recovery pass must fail.
pub async fn list_executing(conn: &libsql::Connection) -> Result<Vec<Job>, DatabaseError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, owner, phase, transfer_xml, results_xml, created, started, ended, error
             FROM jobs WHERE phase = ?",
        )
        .await
        .map_err(|e| DatabaseError::sql("prepare list executing jobs", e))?;
    let mut rows = stmt
        .query((Phase::Executing.to_string(),))
        .await
        .map_err(|e| DatabaseError::sql("query list executing jobs", e))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().await.map_err(|e| DatabaseError::sql("step list executing jobs", e))? {
        out.push(row_to_job(&row)?);
    }
    Ok(out)
}

fn row_to_job(row: &libsql::Row) -> Result<Job, DatabaseError> {
    let id: String = row.get(0).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
    let owner: String = row.get(1).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
    let phase_token: String = row.get(2).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
    let transfer_xml: String = row.get(3).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
    let results_xml: Option<String> = row.get(4).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
    let created: String = row.get(5).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
    let started: Option<String> = row.get(6).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
    let ended: Option<String> = row.get(7).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;
    let error: Option<String> = row.get(8).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?;

    let phase: Phase = phase_token
        .parse()
        .map_err(|e: crate::error::VoSpaceError| DatabaseError::RowDecodingError(e.to_string()))?;
    let results: Vec<Protocol> = match results_xml {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))?,
        None => Vec::new(),
    };

    Ok(Job {
        id,
        owner,
        phase,
        transfer_xml,
        results,
        created_at: parse_timestamp(&created)?,
        started_at: started.as_deref().map(parse_timestamp).transpose()?,
        ended_at: ended.as_deref().map(parse_timestamp).transpose()?,
        error,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::RowDecodingError(e.to_string()))
}

fn encode_results(results: &[Protocol]) -> Result<String, DatabaseError> {
    serde_json::to_string(results).map_err(|e| DatabaseError::RowDecodingError(e.to_string()))
}

#[cfg(test)]
#[path = "jobs_test.rs"]
mod jobs_test;
