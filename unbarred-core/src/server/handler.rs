use super::stream::{ndjson_body, GENERIC_ERROR};
use super::types::{ChatRequestBody, ChatResponseBody, CsvQuery, ErrorBody};
use super::AppState;
use crate::config::ResponseMode;
use crate::jurisdiction::Jurisdiction;
use crate::pipeline::{PipelineError, PipelineEvent};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, info, warn};

const NDJSON: &str = "application/x-ndjson; charset=utf-8";
const CSV: &str = "text/csv; charset=utf-8";

pub(super) async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// `POST /api/chat`
///
/// The status is decided by the pipeline's first event: a failure before any
/// text is a 500 (or 204 when the jurisdiction has no documents), anything
/// else starts a 200 answer.
pub(super) async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequestBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected chat request body");
            return error_body(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    let jurisdiction = resolve_jurisdiction(body.county.as_deref());
    let (mut events, task) = state.pipeline.spawn(body.query().to_string(), jurisdiction);

    match state.pipeline.config().response_mode {
        ResponseMode::Streaming => match events.recv().await {
            Some(PipelineEvent::Failed(e)) => pipeline_error(e),
            None => pipeline_error(PipelineError::UpstreamUnavailable(
                "pipeline stopped before answering".to_string(),
            )),
            Some(first) => {
                ([(CONTENT_TYPE, NDJSON)], ndjson_body(first, events, task)).into_response()
            }
        },
        ResponseMode::Buffered => {
            let mut answer = String::new();
            while let Some(event) = events.recv().await {
                match event {
                    PipelineEvent::Chunk(text) => answer.push_str(&text),
                    PipelineEvent::Done => break,
                    PipelineEvent::Failed(e) => return pipeline_error(e),
                }
            }
            Json(ChatResponseBody { response: answer }).into_response()
        }
    }
}

/// `GET /api/csv?query=&county=`
pub(super) async fn csv(State(state): State<AppState>, Query(params): Query<CsvQuery>) -> Response {
    let jurisdiction = resolve_jurisdiction(params.county.as_deref());

    match state.exporter.export(&params.query, jurisdiction).await {
        Ok(body) => {
            let disposition = format!("attachment; filename=\"{}\"", state.exporter.filename());
            (
                StatusCode::OK,
                [(CONTENT_TYPE, CSV.to_string()), (CONTENT_DISPOSITION, disposition)],
                body,
            )
                .into_response()
        }
        Err(e) => pipeline_error(e),
    }
}

fn resolve_jurisdiction(county: Option<&str>) -> Option<Jurisdiction> {
    let county = county.map(str::trim).filter(|c| !c.is_empty())?;
    let parsed = Jurisdiction::parse(county);
    if parsed.is_none() {
        info!(county, "Unsupported jurisdiction requested");
    }
    parsed
}

fn pipeline_error(err: PipelineError) -> Response {
    match err {
        PipelineError::NoDocumentsForJurisdiction => StatusCode::NO_CONTENT.into_response(),
        other => {
            error!(error = %other, "Request failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR)
        }
    }
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
