// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::atomic::AtomicBool;
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::curve_service::CurveService;
use crate::application::results_view_model::{ResultsDeps, ResultsViewModel};
use crate::application::sync_coordinator::SyncCoordinator;
use crate::application::training_repository::TrainingHistoryRepository;
use crate::application::upload_ports::{SyncChannel, VideoTransport};
use crate::application::video_upload_service::{
    VideoRetryJob, VideoSyncChannel, VideoUploadService, VideoUploadSettings,
};
use crate::infrastructure::config::{load_app_config, load_uploads_config};
use crate::infrastructure::firestore_channel::FirestoreChannel;
use crate::infrastructure::http_video_transport::HttpVideoTransport;
use crate::infrastructure::json_history_store::JsonHistoryStore;
use crate::infrastructure::network_monitor::ConfiguredNetworkMonitor;
use crate::infrastructure::retry_scheduler::TokioRetryScheduler;
use crate::infrastructure::supabase_csv_channel::{CsvRetryJob, CsvUploader, SupabaseCsvChannel};
use crate::infrastructure::worker_pool::WorkerPool;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    get_curve, get_results, health_check, load_results, refresh_videos, set_metered_consent,
    set_network_transport, start_sync, stream_results, submit_self_report, toggle_video,
    upload_videos,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let app_config = load_app_config().context("Failed to load config/app")?;
    let uploads_config = load_uploads_config().context("Failed to load config/uploads")?;

    // Create repository (infrastructure layer)
    let repository: Arc<dyn TrainingHistoryRepository> =
        Arc::new(JsonHistoryStore::open(&app_config.store.history_path).await?);
    let network = Arc::new(ConfiguredNetworkMonitor::new(app_config.network.transport));
    let metered_consent = Arc::new(AtomicBool::new(app_config.network.metered_consent));

    // Video upload with background retries
    let transport: Arc<dyn VideoTransport> = Arc::new(HttpVideoTransport::new(&uploads_config.video));
    let video_settings = VideoUploadSettings {
        video_dir: uploads_config.video.video_dir.clone(),
        user_id: app_config.user.id.clone(),
        retry_interval_minutes: uploads_config.video.retry_interval_minutes,
    };
    let retry_job = Arc::new(VideoRetryJob::new(
        transport.clone(),
        repository.clone(),
        video_settings.clone(),
    ));
    let retries = Arc::new(TokioRetryScheduler::new(
        retry_job,
        uploads_config.video.max_attempts,
    ));
    let videos = Arc::new(VideoUploadService::new(
        transport,
        repository.clone(),
        retries,
        network.clone(),
        video_settings,
    ));

    // CSV uploads with their own background retries
    let csv_retry_interval = uploads_config.supabase.retry_interval_minutes;
    let csv_max_attempts = uploads_config.supabase.max_attempts;
    let csv_uploader = Arc::new(CsvUploader::new(uploads_config.supabase, repository.clone()));
    let csv_retries = Arc::new(TokioRetryScheduler::new(
        Arc::new(CsvRetryJob::new(csv_uploader.clone(), app_config.user.id.clone())),
        csv_max_attempts,
    ));

    // Sync channels (application layer)
    let mut channels: Vec<Arc<dyn SyncChannel>> = vec![
        Arc::new(FirestoreChannel::new(uploads_config.firestore, repository.clone())),
        Arc::new(SupabaseCsvChannel::new(csv_uploader, csv_retries, csv_retry_interval)),
    ];
    if app_config.sync.include_videos {
        channels.push(Arc::new(VideoSyncChannel::new(
            videos.clone(),
            metered_consent.clone(),
        )));
    }
    let coordinator = SyncCoordinator::new(channels, app_config.sync.remaining_strategy);

    let results = ResultsViewModel::spawn(ResultsDeps {
        repository: repository.clone(),
        coordinator,
        videos,
        network: network.clone(),
        pool: WorkerPool::new(app_config.sync.worker_threads),
        user_id: app_config.user.id.clone(),
        metered_consent,
    });

    // Create application state
    let state = Arc::new(AppState {
        results,
        curve_service: CurveService::new(repository, app_config.chart.clone()),
        network,
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/results", get(get_results))
        .route("/results/load", post(load_results))
        .route("/results/stream", get(stream_results))
        .route("/results/:id/self-report", post(submit_self_report))
        .route("/records/:id/curve", get(get_curve))
        .route("/sync", post(start_sync))
        .route("/videos/:id/toggle", post(toggle_video))
        .route("/videos/upload", post(upload_videos))
        .route("/videos/refresh", post(refresh_videos))
        .route("/network/consent", put(set_metered_consent))
        .route("/network/transport", put(set_network_transport))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = app_config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", app_config.server.bind))?;
    tracing::info!("Starting rehab-sync service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
