// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod firestore_channel;
pub mod http_video_transport;
pub mod json_history_store;
pub mod network_monitor;
pub mod retry_scheduler;
pub mod supabase_csv_channel;
pub mod worker_pool;
