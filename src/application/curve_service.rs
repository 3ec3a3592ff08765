// Curve service - Turns a stored training curve into chart geometry
use crate::application::training_repository::TrainingHistoryRepository;
use crate::domain::curve::{CanvasSize, ChartLayout, CurvePlot, map_curve, parse_curve_json};
use anyhow::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct CurveService {
    repository: Arc<dyn TrainingHistoryRepository>,
    layout: ChartLayout,
}

impl CurveService {
    pub fn new(repository: Arc<dyn TrainingHistoryRepository>, layout: ChartLayout) -> Self {
        Self { repository, layout }
    }

    pub fn layout(&self) -> &ChartLayout {
        &self.layout
    }

    /// Geometry for one record's curve, or `None` when the record does not exist
    pub async fn curve_for(&self, training_id: &str, canvas: CanvasSize) -> Result<Option<CurvePlot>> {
        let Some(record) = self.repository.record_by_id(training_id).await? else {
            return Ok(None);
        };

        let parsed = parse_curve_json(&record.curve_json);
        tracing::debug!(
            "Curve for {}: {} samples, {} dropped",
            training_id,
            parsed.samples.len(),
            parsed.dropped
        );
        Ok(Some(map_curve(&parsed.samples, canvas, &self.layout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::training::TrainingRecord;
    use crate::infrastructure::json_history_store::JsonHistoryStore;

    fn record(id: &str, curve_json: &str) -> TrainingRecord {
        TrainingRecord {
            training_id: id.to_string(),
            training_label: "TONGUE_UP".to_string(),
            create_at: 0,
            finish_at: 0,
            target_times: 5,
            achieved_times: 5,
            duration_time: 10,
            curve_json: curve_json.to_string(),
            synced: false,
            csv_uploaded: false,
            csv_file_name: String::new(),
            self_report_count: None,
            video_uploaded: false,
            video_file_name: String::new(),
        }
    }

    fn service() -> CurveService {
        let store = JsonHistoryStore::in_memory(vec![
            record("flat", "[]"),
            record("wave", r#"[{"t":0,"v":1},{"t":1,"v":-1},{"t":2,"v":"0"}]"#),
        ]);
        CurveService::new(Arc::new(store), ChartLayout::default())
    }

    #[tokio::test]
    async fn test_curve_geometry_for_record() {
        let plot = service()
            .curve_for("wave", CanvasSize::new(500.0, 300.0))
            .await
            .unwrap()
            .unwrap();
        let CurvePlot::Curve(geometry) = plot else {
            panic!("expected a curve");
        };
        assert_eq!(geometry.path.len(), 3);
        assert_eq!(geometry.x_ticks.len(), 3);
        assert!(geometry.zero_line.is_some());
    }

    #[tokio::test]
    async fn test_empty_curve_and_unknown_record() {
        let service = service();
        let canvas = CanvasSize::new(500.0, 300.0);
        assert_eq!(
            service.curve_for("flat", canvas).await.unwrap(),
            Some(CurvePlot::NoData)
        );
        assert_eq!(service.curve_for("missing", canvas).await.unwrap(), None);
    }

    #[test]
    fn test_canvas_must_clear_configured_margin() {
        let layout = ChartLayout {
            margin: 40.0,
            ..ChartLayout::default()
        };
        let service = CurveService::new(Arc::new(JsonHistoryStore::in_memory(Vec::new())), layout);
        assert!(service.layout().fits(CanvasSize::new(81.0, 81.0)));
        assert!(!service.layout().fits(CanvasSize::new(80.0, 400.0)));
        assert!(!service.layout().fits(CanvasSize::new(600.0, 50.0)));
    }
}
