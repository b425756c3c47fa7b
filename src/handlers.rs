use axum::{
    body::Bytes,
    extract::{multipart::Field, Multipart, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures_util::{stream, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::events::SubscriberId;
use crate::models::{
    ErrorResponse, FileListResponse, FileResult, FileStatus, SubscriberQuery, UploadResponse,
};
use crate::state::AppState;

// chunks buffered between the request body and a file pipeline
const PART_CHANNEL_DEPTH: usize = 2;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

// upload every file part of a multipart request, reporting progress to `socketId`
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubscriberQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    tracing::debug!("Processing upload request for subscriber {}", query.socket_id);

    // dropped with the request if the client goes away, which cancels its pipelines
    let mut session = state.orchestrator.begin_session(
        SubscriberId::new(query.socket_id),
        state.files_dir.clone(),
        state.progress_delay,
    );
    let mut parts = 0usize;
    let mut body_error = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to read multipart field: {}", e);
                body_error = Some(format!("Failed to read multipart field: {}", e));
                break;
            }
        };

        let Some(filename) = field.file_name().map(str::to_owned) else {
            tracing::debug!("Skipping non-file field {:?}", field.name());
            continue;
        };
        let field_name = field.name().unwrap_or_default().to_owned();
        parts += 1;

        let (tx, rx) = mpsc::channel(PART_CHANNEL_DEPTH);
        session.on_file_part(&field_name, ReceiverStream::new(rx), &filename);

        if let Err(e) = pump_field(field, tx).await {
            tracing::error!("Request body broke while reading {}: {}", filename, e);
            body_error = Some(format!("Failed to read file data: {}", e));
            break;
        }
    }

    // a truncated or malformed body is never reported as stored
    if let Some(error) = body_error {
        session.abort();
        let result = session.on_request_end().await;
        tracing::warn!(
            "Upload session {} rejected after {} parts: {}",
            result.session_id,
            parts,
            error
        );
        return Err(api_error(StatusCode::BAD_REQUEST, error));
    }

    let result = session.on_request_end().await;

    if parts == 0 {
        tracing::warn!("Upload request contained no file field");
        return Err(api_error(StatusCode::BAD_REQUEST, "No file provided"));
    }

    let success = result.is_success();
    let session_id = result.session_id.to_string();
    let files: Vec<FileResult> = result
        .succeeded
        .into_iter()
        .chain(result.failed)
        .map(FileResult::from)
        .collect();

    if success {
        tracing::info!("📤 Upload session {} stored {} files", session_id, files.len());
        Ok((
            StatusCode::OK,
            Json(UploadResponse {
                success,
                result: "Files uploaded with success!".to_string(),
                session_id,
                files,
            }),
        ))
    } else {
        tracing::warn!("Upload session {} finished with failures", session_id);
        Ok((
            StatusCode::MULTI_STATUS,
            Json(UploadResponse {
                success,
                result: "Some files failed to upload".to_string(),
                session_id,
                files,
            }),
        ))
    }
}

// feed one multipart field into its pipeline, waiting whenever the pipeline is behind
async fn pump_field(
    mut field: Field<'_>,
    tx: mpsc::Sender<Result<Bytes, String>>,
) -> Result<(), axum::extract::multipart::MultipartError> {
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if tx.send(Ok(chunk)).await.is_err() {
                    // pipeline already settled, the rest of the part is skipped
                    tracing::trace!("Pipeline closed early, discarding remainder of part");
                    return Ok(());
                }
            }
            Ok(None) => return Ok(()),
            Err(e) => {
                let _ = tx.send(Err(e.to_string())).await;
                return Err(e);
            }
        }
    }
}

// server-sent events stream of upload progress for `socketId`
pub async fn progress_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubscriberQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscriber = SubscriberId::new(query.socket_id);
    tracing::debug!("Subscriber {} connected for progress events", subscriber);

    // the subscription lives inside the stream, so a closed connection unregisters it
    let subscription = state.hub.subscribe(&subscriber);
    let stream = stream::unfold(subscription, |mut subscription| async move {
        let notification = subscription.recv().await?;
        Some((notification, subscription))
    })
    .filter_map(|notification| {
        Event::default()
            .event(notification.event)
            .json_data(&notification.payload)
            .ok()
            .map(Ok)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// list all files in the storage directory
pub async fn list_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FileListResponse>, ApiError> {
    tracing::debug!("Listing files in directory: {:?}", state.files_dir);
    let mut files = Vec::new();

    let mut entries = fs::read_dir(&state.files_dir).await.map_err(|e| {
        tracing::error!("Failed to read directory {:?}: {}", state.files_dir, e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read directory: {}", e),
        )
    })?;

    while let Some(entry) = entries.next_entry().await.map_err(|e| {
        tracing::error!("Failed to read directory entry: {}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to read directory entry: {}", e),
        )
    })? {
        let metadata = entry.metadata().await.map_err(|e| {
            tracing::warn!("Failed to read metadata for entry: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to read metadata: {}", e),
            )
        })?;

        if !metadata.is_file() {
            continue;
        }

        let last_modified = metadata
            .modified()
            .ok()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339())
            .unwrap_or_else(|| "Unknown".to_string());

        files.push(FileStatus {
            file: entry.file_name().to_string_lossy().to_string(),
            size: metadata.len(),
            last_modified,
        });
    }

    files.sort_by(|a, b| a.file.cmp(&b.file));
    let total = files.len();
    tracing::debug!("Found {} files total", total);
    Ok(Json(FileListResponse { files, total }))
}

// health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "driveway",
        "subscribers": state.hub.subscriber_count(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
