//! `/vospace/transfers` and `/vospace/synctrans` handlers (spec §6, §4.C).

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use crate::dispatch::identity;
use crate::dispatch::AppState;
use crate::engine::SyncOutcome;
use crate::error::VoSpaceError;
use crate::model::job::Phase;
use crate::model::node::View;
use crate::model::transfer::{Protocol, ProtocolKind, Transfer};
use crate::xml::codec;

fn xml_response(status: StatusCode, body: String) -> Response {
    (status, [("content-type", "application/xml")], body).into_response()
}

async fn create_transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, VoSpaceError> {
    let identity = identity::resolve(&headers)?;
    if body.is_empty() {
        return Err(VoSpaceError::InvalidArgument("empty transfer request".to_string()));
    }
    // Validate before persisting the raw XML as the job's payload.
    codec::decode_transfer(&body)?;

    let job = state.engine.create(body, &identity, Phase::Pending).await?;
    let xml = codec::encode_job(&job)?;
    Ok(xml_response(StatusCode::CREATED, xml))
}

#[derive(Debug, Deserialize, Default)]
pub struct SyncTransferQuery {
    #[serde(rename = "TARGET")]
    target: Option<String>,
    #[serde(rename = "DIRECTION")]
    direction: Option<String>,
    #[serde(rename = "PROTOCOL")]
    protocol: Option<String>,
    #[serde(rename = "VIEW")]
    view: Option<String>,
    #[serde(rename = "REQUEST")]
    request: Option<String>,
}

async fn sync_transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SyncTransferQuery>,
    body: String,
) -> Result<Response, VoSpaceError> {
    let identity = identity::resolve(&headers)?;

    let from_query_params = query.target.is_some();
    let (transfer, transfer_xml) = if let Some(target) = &query.target {
        let direction = query
            .direction
            .as_deref()
            .ok_or_else(|| VoSpaceError::InvalidArgument("DIRECTION is required".to_string()))?;
        let protocol_uri = query
            .protocol
            .as_deref()
            .ok_or_else(|| VoSpaceError::InvalidArgument("PROTOCOL is required".to_string()))?;
        let kind = ProtocolKind::parse(protocol_uri)?;
        let view = query.view.clone().map(View::new);
        let transfer = Transfer::from_parts(target, direction, None, vec![Protocol::new(kind)], view)?;
        let xml = codec::encode_transfer(&transfer, state.store.space_name())?;
        (transfer, xml)
    } else {
        if body.is_empty() {
            return Err(VoSpaceError::InvalidArgument("empty transfer request".to_string()));
        }
        let transfer = codec::decode_transfer(&body)?;
        (transfer, body)
    };

    // Spec Open Question: a synchronous request naming a node-to-node
    // direction is rejected here, at the dispatcher, not merely defended
    // against inside the engine.
    if transfer.is_node_transfer() {
        return Err(VoSpaceError::InvalidArgument(
            "synchronous transfers must be protocol transfers".to_string(),
        ));
    }

    let redirect = if from_query_params && matches!(transfer, Transfer::PullFromSpace { .. }) {
        if query.request.as_deref() != Some("redirect") {
            return Err(VoSpaceError::InvalidArgument("REQUEST must be set to redirect".to_string()));
        }
        true
    } else {
        false
    };

    match state.engine.run_synchronous(transfer, transfer_xml, &identity, redirect).await? {
        SyncOutcome::Redirect(url) => {
            let response = Response::builder()
                .status(StatusCode::SEE_OTHER)
                .header(header::LOCATION, url)
                .body(Body::empty())
                .map_err(|e| VoSpaceError::InternalError(e.to_string()))?;
            Ok(response)
        }
        SyncOutcome::Job(job) => {
            // Spec §4.C step (e): a non-redirect synchronous request
            // returns the full `transferDetails` XML, not a job summary.
            let xml = codec::encode_transfer_details(&job.results)?;
            Ok(xml_response(StatusCode::OK, xml))
        }
    }
}

async fn get_job_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> Result<Response, VoSpaceError> {
    let identity = identity::resolve(&headers)?;
    let job = state.engine.get_job(&job_id, &identity).await?;
    let xml = codec::encode_job(&job)?;
    Ok(xml_response(StatusCode::OK, xml))
}

async fn get_job_phase(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> Result<Response, VoSpaceError> {
    let identity = identity::resolve(&headers)?;
    let job = state.engine.get_job(&job_id, &identity).await?;
    Ok((StatusCode::OK, job.phase.to_string()).into_response())
}

async fn get_transfer_details(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> Result<Response, VoSpaceError> {
    let identity = identity::resolve(&headers)?;
    let job = state.engine.get_job(&job_id, &identity).await?;
    if !job.results_visible() {
        return Err(VoSpaceError::InvalidJobStateError(format!("job {job_id} has not reached EXECUTING")));
    }
    let xml = codec::encode_transfer_details(&job.results)?;
    Ok(xml_response(StatusCode::OK, xml))
}

async fn modify_job_phase(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
    body: String,
) -> Result<Response, VoSpaceError> {
    let identity = identity::resolve(&headers)?;
    match body.trim().to_uppercase().as_str() {
        "PHASE=RUN" => state.engine.run(&job_id, &identity).await?,
        "PHASE=ABORT" => state.engine.abort(&job_id, &identity).await?,
        "" => return Err(VoSpaceError::InvalidArgument("empty UWS phase command".to_string())),
        other => return Err(VoSpaceError::InvalidArgument(format!("unknown UWS phase command: {other}"))),
    }
    Ok(StatusCode::OK.into_response())
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/vospace/transfers", post(create_transfer))
        .route("/vospace/synctrans", post(sync_transfer))
        .route("/vospace/transfers/:job_id", get(get_job_summary))
        .route("/vospace/transfers/:job_id/phase", get(get_job_phase).post(modify_job_phase))
        .route("/vospace/transfers/:job_id/results/transferDetails", get(get_transfer_details))
        .with_state(state)
}

#[cfg(test)]
#[path = "transfers_test.rs"]
mod transfers_test;
