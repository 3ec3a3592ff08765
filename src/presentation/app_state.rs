// Application state for HTTP handlers
use crate::application::curve_service::CurveService;
use crate::application::results_view_model::ResultsHandle;
use crate::infrastructure::network_monitor::ConfiguredNetworkMonitor;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub results: ResultsHandle,
    pub curve_service: CurveService,
    pub network: Arc<ConfiguredNetworkMonitor>,
}
