//! Transfer Engine (spec §4.C).
//!
//! Owns the UWS job table and drives its state machine: the synchronous
//! fast path, asynchronous create/run/abort, node-transfer (copy/move)
//! dispatch, and a startup recovery pass. Generalizes the teacher's
//! connection-per-operation pattern (`db/store.rs`) to a second table
//! sharing the same database, plus a background `tokio::spawn` worker per
//! asynchronous job.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::db::{DatabaseError, MetadataStore};
use crate::engine::jobs;
use crate::engine::ulid;
use crate::error::VoSpaceError;
use crate::identity::Identity;
use crate::model::job::{Job, Phase};
use crate::model::node::NodeType;
use crate::model::path::NodePath;
use crate::model::transfer::{Endpoint, Protocol, Transfer};
use crate::storage::{Direction, StorageBackend, StorageEndpoint};
use crate::xml::codec;

/// The outcome of a synchronous transfer request (spec §4.C step (e)).
#[derive(Debug)]
pub enum SyncOutcome {
    /// `REQUEST=redirect`: the caller wants a 303 to this URL.
    Redirect(String),
    /// Otherwise: the full job record, for `transferDetails` encoding.
    Job(Job),
}

/// Drives the UWS job state machine over a shared [`MetadataStore`] and a
/// pluggable [`StorageBackend`].
#[derive(Clone)]
pub struct TransferEngine {
    store: MetadataStore,
    backend: Arc<dyn StorageBackend>,
    candidate_endpoints: Vec<StorageEndpoint>,
    abort_grace_period: Duration,
    cancellations: Arc<Mutex<HashMap<String, Arc<Notify>>>>,
}

impl TransferEngine {
    pub fn new(
        store: MetadataStore,
        backend: Arc<dyn StorageBackend>,
        candidate_endpoints: Vec<StorageEndpoint>,
        abort_grace_period: Duration,
    ) -> Self {
        TransferEngine {
            store,
            backend,
            candidate_endpoints,
            abort_grace_period,
            cancellations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    // -----------------------------------------------------------------
    // create / observe
    // -----------------------------------------------------------------

    /// Insert a job row holding the serialized request XML, with the given
    /// initial phase and a fresh ULID identifier.
    pub async fn create(
        &self,
        transfer_xml: String,
        identity: &Identity,
        initial_phase: Phase,
    ) -> Result<Job, VoSpaceError> {
        let now = Utc::now();
        let job = Job {
            id: ulid::generate(),
            owner: identity.as_str().to_string(),
            phase: initial_phase,
            transfer_xml,
            results: Vec::new(),
            created_at: now,
            started_at: if initial_phase == Phase::Executing { Some(now) } else { None },
            ended_at: None,
            error: None,
        };
        let conn = self.store.connect_with_timeout().await.map_err(VoSpaceError::from)?;
        jobs::insert(&conn, &job).await.map_err(VoSpaceError::from)?;
        Ok(job)
    }

    /// Only the owner may observe a job (spec §4.C).
    pub async fn get_job(&self, job_id: &str, identity: &Identity) -> Result<Job, VoSpaceError> {
        let conn = self.store.connect_with_timeout().await.map_err(VoSpaceError::from)?;
        let job = jobs::load(&conn, job_id)
            .await
            .map_err(VoSpaceError::from)?
            .ok_or_else(|| VoSpaceError::InvalidJobStateError(format!("no such job: {job_id}")))?;
        self.check_owner(&job, identity)?;
        Ok(job)
    }

    fn check_owner(&self, job: &Job, identity: &Identity) -> Result<(), VoSpaceError> {
        if job.owner != identity.as_str() {
            return Err(VoSpaceError::PermissionDenied(format!(
                "identity {identity} does not own job {}",
                job.id
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // synchronous transfers
    // -----------------------------------------------------------------

    /// One logical step (spec §4.C "Synchronous transfers"): resolve an
    /// endpoint, mark the target busy on push, store the result, and
    /// complete the job immediately. Rejects node-to-node transfers — the
    /// dispatcher is expected to have already rejected those, this is a
    /// defense against a caller that bypasses it.
    pub async fn run_synchronous(
        &self,
        transfer: Transfer,
        transfer_xml: String,
        identity: &Identity,
        redirect: bool,
    ) -> Result<SyncOutcome, VoSpaceError> {
        if transfer.is_node_transfer() {
            return Err(VoSpaceError::InvalidArgument(
                "synchronous transfers must be protocol transfers".to_string(),
            ));
        }

        let target = transfer.target().clone();
        let (direction, protocols) = match &transfer {
            Transfer::PushToSpace { protocols, .. } => (Direction::PushToSpace, protocols.clone()),
            Transfer::PullFromSpace { protocols, .. } => (Direction::PullFromSpace, protocols.clone()),
            _ => unreachable!("node transfers rejected above"),
        };

        let node_type = self.verify_target_for_direction(&target, direction).await?;

        let mut results = Vec::new();
        for protocol in &protocols {
            if let Some(endpoint) = self.select_endpoint(protocol, node_type, &target, direction).await? {
                results.push(Protocol::with_endpoint(protocol.kind, endpoint));
            }
        }

        if matches!(direction, Direction::PushToSpace) {
            self.store.set_busy(&target, true).await?;
        }

        let job = self.create(transfer_xml, identity, Phase::Executing).await?;
        let conn = self.store.connect_with_timeout().await.map_err(VoSpaceError::from)?;
        jobs::update_results(&conn, &job.id, &results).await.map_err(VoSpaceError::from)?;

        if matches!(direction, Direction::PushToSpace) {
            self.store.set_busy(&target, false).await?;
        }
        jobs::update_phase(&conn, &job.id, Phase::Completed, None, Some(Utc::now()), None)
            .await
            .map_err(VoSpaceError::from)?;

        let mut job = job;
        job.phase = Phase::Completed;
        job.results = results;

        if redirect {
            let url = job
                .results
                .first()
                .and_then(|p| p.endpoint.as_ref())
                .map(|e| e.url.clone())
                .ok_or_else(|| VoSpaceError::InternalError("no endpoint available to redirect to".to_string()))?;
            Ok(SyncOutcome::Redirect(url))
        } else {
            Ok(SyncOutcome::Job(job))
        }
    }

    /// Verify the node preconditions for a protocol transfer and return the
    /// node type the endpoint filter should use: for pull, the existing
    /// target node's own type; for push, the existing node's type if one is
    /// already there (an overwrite) or `DataNode` for a fresh upload.
    async fn verify_target_for_direction(
        &self,
        target: &NodePath,
        direction: Direction,
    ) -> Result<NodeType, VoSpaceError> {
        match direction {
            Direction::PullFromSpace => {
                let node = self
                    .store
                    .get_node(target)
                    .await?
                    .ok_or_else(|| VoSpaceError::NodeDoesNotExist(target.to_string()))?;
                Ok(node.node_type())
            }
            Direction::PushToSpace => {
                let parent = target
                    .parent()
                    .ok_or_else(|| VoSpaceError::InvalidArgument("cannot push to the root path".to_string()))?;
                self.store
                    .get_node(&parent)
                    .await?
                    .ok_or_else(|| VoSpaceError::ContainerDoesNotExist(parent.to_string()))?;
                Ok(self
                    .store
                    .get_node(target)
                    .await?
                    .map(|n| n.node_type())
                    .unwrap_or(NodeType::DataNode))
            }
        }
    }

    async fn select_endpoint(
        &self,
        protocol: &Protocol,
        node_type: NodeType,
        path: &NodePath,
        direction: Direction,
    ) -> Result<Option<Endpoint>, VoSpaceError> {
        let candidates: Vec<StorageEndpoint> =
            self.candidate_endpoints.iter().filter(|e| e.protocol == protocol.kind).cloned().collect();
        let filtered = self
            .backend
            .filter_storage_endpoints(&candidates, node_type, path, protocol, direction)
            .await?;
        Ok(filtered.into_iter().next().map(|e| e.endpoint))
    }

    // -----------------------------------------------------------------
    // asynchronous transfers
    // -----------------------------------------------------------------

    /// `PHASE=RUN`: the owner moves a `PENDING` job to `QUEUED`, then spawns
    /// the background worker that drives it through `EXECUTING` to a
    /// terminal phase.
    pub async fn run(&self, job_id: &str, identity: &Identity) -> Result<(), VoSpaceError> {
        let job = self.get_job(job_id, identity).await?;
        if job.phase != Phase::Pending {
            return Err(VoSpaceError::InvalidJobStateError(format!(
                "job {job_id} is not PENDING (currently {})",
                job.phase
            )));
        }

        self.set_phase(job_id, Phase::Queued, None, None).await?;

        let transfer = codec::decode_transfer(&job.transfer_xml)?;
        let cancel = Arc::new(Notify::new());
        self.cancellations.lock().expect("cancellations mutex poisoned").insert(job_id.to_string(), cancel.clone());

        let engine = self.clone();
        let job_id = job_id.to_string();
        let owner = job.owner.clone();
        tokio::spawn(async move {
            engine.execute_async(job_id, transfer, owner, cancel).await;
        });
        Ok(())
    }

    /// `PHASE=ABORT`: cooperative cancellation (spec §4.C, "Cancellation").
    /// `PENDING`/`QUEUED` jobs jump straight to `ABORTED`; `EXECUTING` jobs
    /// are signalled and the command returns immediately — the worker
    /// clears `busy` and finalizes the phase once it observes the signal
    /// or the grace period in [`Self::execute_async`] elapses.
    pub async fn abort(&self, job_id: &str, identity: &Identity) -> Result<(), VoSpaceError> {
        let job = self.get_job(job_id, identity).await?;
        if job.phase.is_terminal() {
            return Err(VoSpaceError::InvalidJobStateError(format!(
                "job {job_id} has already reached a terminal phase ({})",
                job.phase
            )));
        }

        match job.phase {
            Phase::Pending | Phase::Queued => {
                self.set_phase(job_id, Phase::Aborted, None, None).await?;
            }
            Phase::Executing => {
                if let Some(signal) = self.cancellations.lock().expect("cancellations mutex poisoned").get(job_id) {
                    signal.notify_waiters();
                }
            }
            Phase::Completed | Phase::Aborted | Phase::Error => unreachable!("terminal checked above"),
        }
        Ok(())
    }

    async fn execute_async(&self, job_id: String, transfer: Transfer, owner: String, cancel: Arc<Notify>) {
        let identity = Identity::new(owner);
        let result = tokio::select! {
            outcome = self.run_transfer_body(&job_id, &transfer, &identity) => outcome,
            _ = cancel.notified() => Err(TransferOutcome::Aborted),
        };

        self.cancellations.lock().expect("cancellations mutex poisoned").remove(&job_id);

        if let Err(e) = self.finalize_async(&job_id, &transfer, result).await {
            warn!(job_id, error = %e, "failed to finalize async transfer job");
        }
    }

    async fn run_transfer_body(
        &self,
        job_id: &str,
        transfer: &Transfer,
        identity: &Identity,
    ) -> Result<(), TransferOutcome> {
        self.set_phase(job_id, Phase::Executing, Some(Utc::now()), None)
            .await
            .map_err(TransferOutcome::Failed)?;

        match transfer {
            Transfer::PushToSpace { .. } | Transfer::PullFromSpace { .. } => {
                self.run_protocol_transfer_body(job_id, transfer).await
            }
            Transfer::Copy { target, destination } => {
                self.run_node_transfer_body(target, destination, true, identity).await
            }
            Transfer::Move { target, destination } => {
                self.run_node_transfer_body(target, destination, false, identity).await
            }
        }
    }

    async fn run_protocol_transfer_body(&self, job_id: &str, transfer: &Transfer) -> Result<(), TransferOutcome> {
        let target = transfer.target().clone();
        let direction = match transfer {
            Transfer::PushToSpace { .. } => Direction::PushToSpace,
            Transfer::PullFromSpace { .. } => Direction::PullFromSpace,
            _ => unreachable!("protocol transfers only"),
        };
        let protocols = match transfer {
            Transfer::PushToSpace { protocols, .. } | Transfer::PullFromSpace { protocols, .. } => protocols.clone(),
            _ => unreachable!("protocol transfers only"),
        };

        let node_type =
            self.verify_target_for_direction(&target, direction).await.map_err(TransferOutcome::Failed)?;

        if matches!(direction, Direction::PushToSpace) {
            self.store.set_busy(&target, true).await.map_err(TransferOutcome::Failed)?;
        }

        let mut results = Vec::new();
        for protocol in &protocols {
            let endpoint = self
                .select_endpoint(protocol, node_type, &target, direction)
                .await
                .map_err(TransferOutcome::Failed)?;
            if let Some(endpoint) = endpoint {
                results.push(Protocol::with_endpoint(protocol.kind, endpoint));
            }
        }

        let conn = self.store.connect_with_timeout().await.map_err(|e| TransferOutcome::Failed(e.into()))?;
        jobs::update_results(&conn, job_id, &results).await.map_err(|e| TransferOutcome::Failed(e.into()))?;

        if matches!(direction, Direction::PushToSpace) {
            self.store.set_busy(&target, false).await.map_err(TransferOutcome::Failed)?;
        }
        Ok(())
    }

    async fn run_node_transfer_body(
        &self,
        src: &NodePath,
        dest: &NodePath,
        keep_bytes: bool,
        identity: &Identity,
    ) -> Result<(), TransferOutcome> {
        self.store.set_busy(src, true).await.map_err(TransferOutcome::Failed)?;

        let affected = if keep_bytes {
            self.store
                .copy_node(src, dest, identity)
                .await
                .map_err(TransferOutcome::Failed)?
        } else {
            self.store.move_node(src, dest, identity).await.map_err(TransferOutcome::Failed)?;
            vec![self
                .store
                .get_node(dest)
                .await
                .map_err(TransferOutcome::Failed)?
                .ok_or_else(|| TransferOutcome::Failed(VoSpaceError::InternalError("moved node missing".into())))?]
        };

        for node in &affected {
            // For a copy, `affected` holds the freshly-created nodes at the
            // destination; map each one back to its source counterpart by
            // reversing the same prefix rewrite the metadata store applied.
            let original_path = if keep_bytes { dest.rewrite_prefix(node.path(), src) } else { src.clone() };
            let result = if keep_bytes {
                self.backend.copy_storage_node(node.node_type(), &original_path, node.node_type(), node.path()).await
            } else {
                self.backend.move_storage_node(node.node_type(), &original_path, node.node_type(), node.path()).await
            };
            result.map_err(TransferOutcome::Failed)?;
        }

        self.store.set_busy(src, false).await.map_err(TransferOutcome::Failed)?;
        if let Some(first) = affected.first() {
            self.store.set_busy(first.path(), false).await.map_err(TransferOutcome::Failed)?;
        }
        Ok(())
    }

    async fn finalize_async(
        &self,
        job_id: &str,
        transfer: &Transfer,
        outcome: Result<(), TransferOutcome>,
    ) -> Result<(), VoSpaceError> {
        let conn = self.store.connect_with_timeout().await.map_err(VoSpaceError::from)?;
        match outcome {
            Ok(()) => {
                jobs::update_phase(&conn, job_id, Phase::Completed, None, Some(Utc::now()), None)
                    .await
                    .map_err(VoSpaceError::from)?;
                info!(job_id, "transfer job completed");
            }
            Err(TransferOutcome::Aborted) => {
                tokio::time::sleep(self.abort_grace_period).await;
                self.clear_busy_for_transfer(transfer).await?;
                jobs::update_phase(&conn, job_id, Phase::Aborted, None, Some(Utc::now()), None)
                    .await
                    .map_err(VoSpaceError::from)?;
                info!(job_id, "transfer job aborted");
            }
            Err(TransferOutcome::Failed(e)) => {
                self.clear_busy_for_transfer(transfer).await?;
                jobs::update_phase(&conn, job_id, Phase::Error, None, Some(Utc::now()), Some(&e.to_string()))
                    .await
                    .map_err(VoSpaceError::from)?;
                warn!(job_id, error = %e, "transfer job failed");
            }
        }
        Ok(())
    }

    async fn clear_busy_for_transfer(&self, transfer: &Transfer) -> Result<(), VoSpaceError> {
        match transfer {
            Transfer::PushToSpace { target, .. } | Transfer::PullFromSpace { target, .. } => {
                self.store.set_busy(target, false).await
            }
            Transfer::Copy { target, .. } | Transfer::Move { target, .. } => {
                self.store.set_busy(target, false).await
            }
        }
    }

    async fn set_phase(
        &self,
        job_id: &str,
        phase: Phase,
        started_at: Option<chrono::DateTime<Utc>>,
        ended_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<(), VoSpaceError> {
        let conn = self.store.connect_with_timeout().await.map_err(VoSpaceError::from)?;
        jobs::update_phase(&conn, job_id, phase, started_at, ended_at, None).await.map_err(VoSpaceError::from)
    }

    // -----------------------------------------------------------------
    // recovery
    // -----------------------------------------------------------------

    /// Clear `busy` for every node referenced by a job in a terminal phase
    /// and fail (spec: "mark ERROR") any job found `EXECUTING` at startup —
    /// the engine's recovery pass for a crashed prior process (spec §5,
    /// "Busy bit as lease").
    pub async fn recover_at_startup(&self) -> Result<(), DatabaseError> {
        let conn = self.store.connect_with_timeout().await?;
        let stale = jobs::list_executing(&conn).await?;
        for job in &stale {
            if let Ok(transfer) = codec::decode_transfer(&job.transfer_xml) {
                let path = transfer.target().clone();
                let _ = self.store.clear_busy_bulk(&[path]).await;
            }
            jobs::update_phase(
                &conn,
                &job.id,
                Phase::Error,
                None,
                Some(Utc::now()),
                Some("job was EXECUTING when the server last stopped"),
            )
            .await?;
        }
        if !stale.is_empty() {
            warn!(count = stale.len(), "marked stale EXECUTING jobs as ERROR at startup");
        }
        Ok(())
    }
}

/// Internal signal distinguishing a cooperative abort from an outright
/// failure, so [`TransferEngine::finalize_async`] can branch on it without
/// re-parsing an error string.
enum TransferOutcome {
    Aborted,
    Failed(VoSpaceError),
}

#[cfg(test)]
#[path = "transfer_engine_test.rs"]
mod transfer_engine_test;
