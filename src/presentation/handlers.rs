// HTTP request handlers
use crate::application::results_view_model::{ResultsCommand, ResultsSnapshot};
use crate::domain::curve::CanvasSize;
use crate::domain::video::NetworkTransport;
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use chrono::NaiveDate;
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio_stream::wrappers::WatchStream;

const DEFAULT_CANVAS_WIDTH: f64 = 600.0;
const DEFAULT_CANVAS_HEIGHT: f64 = 400.0;

#[derive(Deserialize)]
pub struct LoadRequest {
    pub date: Option<NaiveDate>,
    pub focus: Option<String>,
}

#[derive(Deserialize)]
pub struct SelfReportRequest {
    pub input: String,
}

#[derive(Deserialize)]
pub struct CurveQuery {
    pub width: Option<f64>,
    pub height: Option<f64>,
}

#[derive(Deserialize)]
pub struct ConsentRequest {
    pub allow: bool,
}

#[derive(Deserialize)]
pub struct TransportRequest {
    pub transport: NetworkTransport,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

async fn dispatch(state: &AppState, command: ResultsCommand) -> StatusCode {
    match state.results.send(command).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => {
            tracing::error!("Could not dispatch command: {:#}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Current results snapshot
pub async fn get_results(State(state): State<Arc<AppState>>) -> Json<ResultsSnapshot> {
    Json(state.results.snapshot())
}

pub async fn load_results(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoadRequest>,
) -> StatusCode {
    dispatch(
        &state,
        ResultsCommand::Load {
            date: request.date,
            focus: request.focus,
        },
    )
    .await
}

/// Server-sent events, one per published snapshot
pub async fn stream_results(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = WatchStream::new(state.results.subscribe())
        .map(|snapshot| Event::default().event("snapshot").json_data(snapshot));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn submit_self_report(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<SelfReportRequest>,
) -> StatusCode {
    dispatch(
        &state,
        ResultsCommand::SubmitSelfReport {
            id,
            input: request.input,
        },
    )
    .await
}

/// Chart geometry for one record's curve
pub async fn get_curve(
    Path(id): Path<String>,
    Query(query): Query<CurveQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let canvas = CanvasSize::new(
        query.width.unwrap_or(DEFAULT_CANVAS_WIDTH),
        query.height.unwrap_or(DEFAULT_CANVAS_HEIGHT),
    );
    if !state.curve_service.layout().fits(canvas) {
        return (
            StatusCode::BAD_REQUEST,
            "width and height must exceed twice the chart margin",
        )
            .into_response();
    }

    match state.curve_service.curve_for(&id, canvas).await
    {
        Ok(Some(plot)) => Json(plot).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!("Error building curve for {}: {:#}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn start_sync(State(state): State<Arc<AppState>>) -> StatusCode {
    dispatch(&state, ResultsCommand::StartSync).await
}

pub async fn toggle_video(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> StatusCode {
    dispatch(&state, ResultsCommand::ToggleVideo { id }).await
}

pub async fn upload_videos(State(state): State<Arc<AppState>>) -> StatusCode {
    dispatch(&state, ResultsCommand::UploadSelectedVideos).await
}

pub async fn refresh_videos(State(state): State<Arc<AppState>>) -> StatusCode {
    dispatch(&state, ResultsCommand::RefreshPendingVideos).await
}

pub async fn set_metered_consent(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ConsentRequest>,
) -> StatusCode {
    dispatch(&state, ResultsCommand::SetMeteredConsent(request.allow)).await
}

/// Switch the reported network transport, then re-read pending videos
pub async fn set_network_transport(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TransportRequest>,
) -> StatusCode {
    state.network.set(request.transport);
    dispatch(&state, ResultsCommand::RefreshPendingVideos).await
}
