// Application layer - Use cases and the ports they depend on
pub mod curve_service;
pub mod results_view_model;
pub mod sync_coordinator;
pub mod training_repository;
pub mod upload_ports;
pub mod video_upload_service;
