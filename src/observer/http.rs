use std::path::PathBuf;
use std::sync::Arc;

use hiro_system_kit::slog;
use rocket::data::Capped;
use rocket::http::uri::Origin;
use rocket::http::Status;
use rocket::serde::json::{Json, Value as JsonValue};
use rocket::State;

use super::IBD_PRUNABLE_PATHS;
use crate::error::IngestionError;
use crate::ingestion::MessageHandlers;
use crate::types::CoreNotification;
use crate::utils::loggable_payload;
use crate::{try_debug, try_error, try_warn};

pub struct ObserverState {
    pub handlers: Arc<MessageHandlers>,
    pub ibd_mode_until_block: Option<u64>,
}

#[derive(Responder, Debug)]
pub enum ObserverResponse {
    Json((Status, Json<JsonValue>)),
    Text((Status, &'static str)),
}

impl ObserverResponse {
    pub fn status(&self) -> Status {
        match self {
            ObserverResponse::Json((status, _)) | ObserverResponse::Text((status, _)) => *status,
        }
    }
}

#[get("/")]
pub fn handle_ready() -> Json<JsonValue> {
    Json(json!({
        "status": "ready",
        "msg": "API event server listening for core-node POST messages",
    }))
}

#[post("/new_block", data = "<payload>")]
pub async fn handle_new_block(state: &State<ObserverState>, payload: Capped<String>) -> ObserverResponse {
    ingest(state, "/new_block", payload).await
}

#[post("/new_burn_block", data = "<payload>")]
pub async fn handle_new_burn_block(
    state: &State<ObserverState>,
    payload: Capped<String>,
) -> ObserverResponse {
    ingest(state, "/new_burn_block", payload).await
}

#[post("/new_mempool_tx", data = "<payload>")]
pub async fn handle_new_mempool_tx(
    state: &State<ObserverState>,
    payload: Capped<String>,
) -> ObserverResponse {
    ingest(state, "/new_mempool_tx", payload).await
}

#[post("/drop_mempool_tx", data = "<payload>")]
pub async fn handle_drop_mempool_tx(
    state: &State<ObserverState>,
    payload: Capped<String>,
) -> ObserverResponse {
    ingest(state, "/drop_mempool_tx", payload).await
}

#[post("/attachments/new", data = "<payload>")]
pub async fn handle_new_attachments(
    state: &State<ObserverState>,
    payload: Capped<String>,
) -> ObserverResponse {
    ingest(state, "/attachments/new", payload).await
}

#[post("/new_microblocks", data = "<payload>")]
pub async fn handle_new_microblocks(
    state: &State<ObserverState>,
    payload: Capped<String>,
) -> ObserverResponse {
    ingest(state, "/new_microblocks", payload).await
}

#[post("/<_path..>", rank = 20)]
pub fn handle_unknown_path(
    state: &State<ObserverState>,
    _path: PathBuf,
    origin: &Origin<'_>,
) -> ObserverResponse {
    let path = origin.path().as_str();
    try_error!(state.handlers.ctx, "Unexpected event on path {}", path);
    state.handlers.monitoring.request_handled("unmatched", 404);
    not_found(path)
}

async fn ingest(
    state: &ObserverState,
    path: &'static str,
    payload: Capped<String>,
) -> ObserverResponse {
    let response = if !payload.is_complete() {
        too_large(state, path, payload.n.written)
    } else {
        let payload = payload.into_inner();
        match check_ibd_mode(state, path, &payload).await {
            Some(response) => response,
            None => process(state, path, &payload).await,
        }
    };
    state
        .handlers
        .monitoring
        .request_handled(path, response.status().code);
    response
}

/// While the chain tip has not passed the configured height, prunable
/// notifications are archived and acknowledged without being processed
async fn check_ibd_mode(
    state: &ObserverState,
    path: &str,
    payload: &str,
) -> Option<ObserverResponse> {
    let ibd_height = state.ibd_mode_until_block?;
    if !IBD_PRUNABLE_PATHS.contains(&path) {
        return None;
    }
    let pruned: Result<bool, IngestionError> = async {
        let chain_tip = state.handlers.chain_tip().await?;
        if chain_tip.block_height > ibd_height {
            return Ok(false);
        }
        archive(state, path, payload).await?;
        Ok(true)
    }
    .await;
    match pruned {
        Ok(false) => None,
        Ok(true) => Some(ObserverResponse::Text((Status::Ok, "IBD"))),
        Err(e) => {
            try_error!(state.handlers.ctx, "IBD mode check failed on {}: {}", path, e);
            Some(ObserverResponse::Json((
                Status::InternalServerError,
                Json(json!({
                    "message": "A middleware error occurred processing the request in IBD mode."
                })),
            )))
        }
    }
}

async fn process(state: &ObserverState, path: &str, payload: &str) -> ObserverResponse {
    let notification = match CoreNotification::parse(path, payload) {
        Some(Ok(notification)) => notification,
        Some(Err(e)) => return failure(state, path, e.into()),
        None => return not_found(path),
    };
    if let Err(e) = state.handlers.handle_notification(notification).await {
        return failure(state, path, e);
    }
    if let Err(e) = archive(state, path, payload).await {
        return failure(state, path, e);
    }
    ObserverResponse::Json((Status::Ok, Json(json!({ "result": "ok" }))))
}

async fn archive(state: &ObserverState, path: &str, payload: &str) -> Result<(), IngestionError> {
    state.handlers.store_raw_event(path, payload).await?;
    try_debug!(state.handlers.ctx, "{} {}", path, loggable_payload(payload));
    Ok(())
}

fn failure(state: &ObserverState, path: &str, err: IngestionError) -> ObserverResponse {
    try_error!(state.handlers.ctx, "error processing core-node {}: {}", path, err);
    ObserverResponse::Json((
        Status::InternalServerError,
        Json(json!({ "error": err.to_string() })),
    ))
}

/// Bodies past the configured limit are refused before parsing
fn too_large(state: &ObserverState, path: &str, read: u64) -> ObserverResponse {
    try_warn!(
        state.handlers.ctx,
        "Refusing {} payload: body limit reached after {} bytes",
        path,
        read
    );
    ObserverResponse::Json((
        Status::PayloadTooLarge,
        Json(json!({ "error": format!("request body for {} exceeds the configured limit", path) })),
    ))
}

fn not_found(path: &str) -> ObserverResponse {
    ObserverResponse::Json((
        Status::NotFound,
        Json(json!({ "error": format!("no route handler for {}", path) })),
    ))
}
