use tempfile::TempDir;

use super::*;
use crate::db::MetadataStore;
use crate::model::transfer::{Endpoint, ProtocolKind};

async fn new_conn() -> (TempDir, libsql::Connection) {
    let dir = TempDir::new().unwrap();
    let store = MetadataStore::new(&dir.path().join("vospace.db"), "example.org").await.unwrap();
    let conn = store.connect_with_timeout().await.unwrap();
    (dir, conn)
}

fn sample_job(id: &str) -> Job {
    Job {
        id: id.to_string(),
        owner: "alice".to_string(),
        phase: Phase::Pending,
        transfer_xml: "<vos:transfer/>".to_string(),
        results: Vec::new(),
        created_at: Utc::now(),
        started_at: None,
        ended_at: None,
        error: None,
    }
}

#[tokio::test]
async fn insert_then_load_roundtrips() {
    let (_dir, conn) = new_conn().await;
    let job = sample_job("01J0000000000000000000AAAA");
    insert(&conn, &job).await.unwrap();

    let loaded = load(&conn, &job.id).await.unwrap().unwrap();
    assert_eq!(loaded.id, job.id);
    assert_eq!(loaded.owner, "alice");
    assert_eq!(loaded.phase, Phase::Pending);
    assert!(loaded.started_at.is_none());
}

#[tokio::test]
async fn load_missing_job_is_none() {
    let (_dir, conn) = new_conn().await;
    assert!(load(&conn, "does-not-exist").await.unwrap().is_none());
}

#[tokio::test]
async fn update_phase_sets_started_once() {
    let (_dir, conn) = new_conn().await;
    let job = sample_job("01J0000000000000000000BBBB");
    insert(&conn, &job).await.unwrap();

    let first_start = Utc::now();
    update_phase(&conn, &job.id, Phase::Executing, Some(first_start), None, None).await.unwrap();
    let after_first = load(&conn, &job.id).await.unwrap().unwrap();
    assert_eq!(after_first.phase, Phase::Executing);
    assert!(after_first.started_at.is_some());

    update_phase(&conn, &job.id, Phase::Completed, Some(Utc::now()), Some(Utc::now()), None)
        .await
        .unwrap();
    let after_second = load(&conn, &job.id).await.unwrap().unwrap();
    assert_eq!(after_second.phase, Phase::Completed);
    assert_eq!(after_second.started_at, after_first.started_at);
    assert!(after_second.ended_at.is_some());
}

#[tokio::test]
async fn update_results_roundtrips() {
    let (_dir, conn) = new_conn().await;
    let job = sample_job("01J0000000000000000000CCCC");
    insert(&conn, &job).await.unwrap();

    let protocol =
        Protocol::with_endpoint(ProtocolKind::HttpsPut, Endpoint::new("https://store.example/a"));
    update_results(&conn, &job.id, &[protocol]).await.unwrap();
    let loaded = load(&conn, &job.id).await.unwrap().unwrap();
    assert_eq!(loaded.results.len(), 1);
    assert_eq!(loaded.results[0].endpoint.as_ref().unwrap().url, "https://store.example/a");
}

#[tokio::test]
async fn update_phase_does_not_clobber_terminal_phase() {
    let (_dir, conn) = new_conn().await;
    let job = sample_job("01J0000000000000000000FFFF");
    insert(&conn, &job).await.unwrap();

    update_phase(&conn, &job.id, Phase::Aborted, None, Some(Utc::now()), None).await.unwrap();
    update_phase(&conn, &job.id, Phase::Executing, Some(Utc::now()), None, None).await.unwrap();

    let loaded = load(&conn, &job.id).await.unwrap().unwrap();
    assert_eq!(loaded.phase, Phase::Aborted);
}

#[tokio::test]
async fn list_executing_only_returns_matching_phase() {
    let (_dir, conn) = new_conn().await;
    let pending = sample_job("01J0000000000000000000DDDD");
    let mut executing = sample_job("01J0000000000000000000EEEE");
    executing.phase = Phase::Executing;
    executing.started_at = Some(Utc::now());
    insert(&conn, &pending).await.unwrap();
    insert(&conn, &executing).await.unwrap();

    let found = list_executing(&conn).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, executing.id);
}
