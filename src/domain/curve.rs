// Curve chart domain model - signal samples to screen-space geometry
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Below this the Y range is treated as flat and every sample sits on zero.
pub const NORMALIZE_EPSILON: f64 = 1e-9;
/// Time spans narrower than this fall back to a unit range.
pub const MIN_RANGE_X: f64 = 0.001;
pub const X_TICK_STEP: f64 = 1.0;
pub const MAX_X_TICKS: usize = 10_000;
const Y_TICK_VALUES: [i32; 3] = [-1, 0, 1];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub time: f64,
    pub value: f64,
}

impl Sample {
    pub fn new(time: f64, value: f64) -> Self {
        Self { time, value }
    }

    pub fn is_finite(&self) -> bool {
        self.time.is_finite() && self.value.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedSample {
    pub time: f64,
    pub normalized_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    pub start: ScreenPoint,
    pub end: ScreenPoint,
}

impl Segment {
    fn new(start: ScreenPoint, end: ScreenPoint) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    pub value: f64,
    pub label: String,
    pub mark: Segment,
    pub label_anchor: ScreenPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PathCommand {
    MoveTo(ScreenPoint),
    LineTo(ScreenPoint),
}

#[cfg(test)]
impl PathCommand {
    pub fn point(&self) -> ScreenPoint {
        match self {
            PathCommand::MoveTo(p) | PathCommand::LineTo(p) => *p,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Fixed decorations around the plot area.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChartLayout {
    pub margin: f64,
    pub tick_length: f64,
    /// Distance of X tick labels above the bottom edge of the canvas.
    pub x_label_inset: f64,
    /// Distance of Y tick labels left of the Y axis.
    pub y_label_offset: f64,
}

impl ChartLayout {
    /// Whether `canvas` leaves a non-empty plot area inside the margins
    pub fn fits(&self, canvas: CanvasSize) -> bool {
        let min = (2.0 * self.margin).max(0.0);
        canvas.width.is_finite()
            && canvas.height.is_finite()
            && canvas.width > min
            && canvas.height > min
    }
}

impl Default for ChartLayout {
    fn default() -> Self {
        Self {
            margin: 50.0,
            tick_length: 8.0,
            x_label_inset: 10.0,
            y_label_offset: 25.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurveBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveGeometry {
    pub bounds: CurveBounds,
    pub normalized: Vec<NormalizedSample>,
    pub path: Vec<PathCommand>,
    pub x_axis: Segment,
    pub y_axis: Segment,
    pub zero_line: Option<Segment>,
    pub x_ticks: Vec<Tick>,
    pub y_ticks: Vec<Tick>,
}

#[cfg(test)]
impl CurveGeometry {
    pub fn points(&self) -> Vec<ScreenPoint> {
        self.path.iter().map(PathCommand::point).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CurvePlot {
    NoData,
    Curve(CurveGeometry),
}

/// Outcome of reading a stored curve; `dropped` counts records that were skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedCurve {
    pub samples: Vec<Sample>,
    pub dropped: usize,
}

/// Parse the stored `[{"t": 0.0, "v": "1.2"}, ...]` curve format.
///
/// Malformed records are skipped; unreadable input yields an empty curve.
pub fn parse_curve_json(raw: &str) -> ParsedCurve {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "[]" {
        tracing::debug!("Empty curve data");
        return ParsedCurve::default();
    }

    let records = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(records)) => records,
        Ok(_) => {
            tracing::warn!("Curve data is not a JSON array");
            return ParsedCurve::default();
        }
        Err(e) => {
            tracing::warn!("Curve data could not be parsed: {}", e);
            return ParsedCurve::default();
        }
    };

    let mut parsed = ParsedCurve::default();
    for (index, record) in records.iter().enumerate() {
        match sample_from_record(record) {
            Some(sample) => parsed.samples.push(sample),
            None => {
                tracing::debug!("Skipping invalid curve point at index {}", index);
                parsed.dropped += 1;
            }
        }
    }

    if parsed.dropped > 0 {
        tracing::warn!(
            "Dropped {} of {} curve points",
            parsed.dropped,
            records.len()
        );
    }
    parsed
}

fn sample_from_record(record: &Value) -> Option<Sample> {
    let time = numeric_field(record, "t")?;
    let value = numeric_field(record, "v")?;
    let sample = Sample::new(time, value);
    sample.is_finite().then_some(sample)
}

/// A JSON number, or a string holding one
fn numeric_field(record: &Value, key: &str) -> Option<f64> {
    match record.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Scale values into [-1, 1] by the largest magnitude.
pub fn normalize(samples: &[Sample]) -> Vec<NormalizedSample> {
    let max_abs_y = samples
        .iter()
        .map(|s| s.value.abs())
        .fold(0.0_f64, f64::max);

    samples
        .iter()
        .map(|s| NormalizedSample {
            time: s.time,
            normalized_value: if max_abs_y < NORMALIZE_EPSILON {
                0.0
            } else {
                s.value / max_abs_y
            },
        })
        .collect()
}

/// Map an ordered sample sequence onto a canvas.
pub fn map_curve(samples: &[Sample], canvas: CanvasSize, layout: &ChartLayout) -> CurvePlot {
    let valid: Vec<Sample> = samples.iter().copied().filter(Sample::is_finite).collect();
    if valid.len() < 2 {
        return CurvePlot::NoData;
    }

    let bounds = CurveBounds {
        min_x: valid.iter().map(|s| s.time).fold(f64::INFINITY, f64::min),
        max_x: valid.iter().map(|s| s.time).fold(f64::NEG_INFINITY, f64::max),
        min_y: valid.iter().map(|s| s.value).fold(f64::INFINITY, f64::min),
        max_y: valid.iter().map(|s| s.value).fold(f64::NEG_INFINITY, f64::max),
    };
    let range_x = if (bounds.max_x - bounds.min_x).abs() < MIN_RANGE_X {
        1.0
    } else {
        bounds.max_x - bounds.min_x
    };

    let frame = PlotFrame::new(canvas, layout, bounds.min_x, range_x);
    let normalized = normalize(&valid);

    let path = normalized
        .iter()
        .enumerate()
        .map(|(index, n)| {
            let point = ScreenPoint::new(frame.x_for(n.time), frame.y_for(n.normalized_value));
            if index == 0 {
                PathCommand::MoveTo(point)
            } else {
                PathCommand::LineTo(point)
            }
        })
        .collect();

    let bottom = canvas.height - layout.margin;
    let x_axis = Segment::new(
        ScreenPoint::new(layout.margin, bottom),
        ScreenPoint::new(canvas.width - layout.margin, bottom),
    );
    let y_axis = Segment::new(
        ScreenPoint::new(layout.margin, layout.margin),
        ScreenPoint::new(layout.margin, bottom),
    );

    // Visibility uses the raw value range, not the normalized one.
    let zero_line = (bounds.min_y <= 0.0 && bounds.max_y >= 0.0).then(|| {
        let y = frame.raw_zero_y(bounds.min_y, bounds.max_y);
        Segment::new(
            ScreenPoint::new(layout.margin, y),
            ScreenPoint::new(canvas.width - layout.margin, y),
        )
    });

    CurvePlot::Curve(CurveGeometry {
        bounds,
        normalized,
        path,
        x_axis,
        y_axis,
        zero_line,
        x_ticks: x_ticks(&frame, canvas, layout, range_x),
        y_ticks: y_ticks(&frame, layout),
    })
}

struct PlotFrame {
    margin: f64,
    draw_width: f64,
    draw_height: f64,
    min_x: f64,
    range_x: f64,
}

impl PlotFrame {
    fn new(canvas: CanvasSize, layout: &ChartLayout, min_x: f64, range_x: f64) -> Self {
        Self {
            margin: layout.margin,
            draw_width: canvas.width - 2.0 * layout.margin,
            draw_height: canvas.height - 2.0 * layout.margin,
            min_x,
            range_x,
        }
    }

    fn x_for(&self, time: f64) -> f64 {
        self.margin + ((time - self.min_x) / self.range_x) * self.draw_width
    }

    fn y_for(&self, normalized: f64) -> f64 {
        self.margin + self.draw_height - ((normalized + 1.0) / 2.0) * self.draw_height
    }

    fn raw_zero_y(&self, min_y: f64, max_y: f64) -> f64 {
        let raw_range = max_y - min_y;
        if raw_range < NORMALIZE_EPSILON {
            return self.y_for(0.0);
        }
        self.margin + self.draw_height - ((0.0 - min_y) / raw_range) * self.draw_height
    }
}

fn x_ticks(frame: &PlotFrame, canvas: CanvasSize, layout: &ChartLayout, range_x: f64) -> Vec<Tick> {
    let steps = (range_x / X_TICK_STEP).floor() as usize;
    let count = steps.saturating_add(1);
    if count > MAX_X_TICKS {
        tracing::warn!(
            "Time range {} needs {} ticks, keeping the first {}",
            range_x,
            count,
            MAX_X_TICKS
        );
    }

    let bottom = canvas.height - layout.margin;
    (0..count.min(MAX_X_TICKS))
        .map(|i| {
            let t = frame.min_x + i as f64 * X_TICK_STEP;
            let x = frame.x_for(t);
            Tick {
                value: t,
                label: format!("{}", t.round() as i64),
                mark: Segment::new(
                    ScreenPoint::new(x, bottom),
                    ScreenPoint::new(x, bottom + layout.tick_length),
                ),
                label_anchor: ScreenPoint::new(x, canvas.height - layout.x_label_inset),
            }
        })
        .collect()
}

fn y_ticks(frame: &PlotFrame, layout: &ChartLayout) -> Vec<Tick> {
    Y_TICK_VALUES
        .iter()
        .map(|&v| {
            let y = frame.y_for(v as f64);
            Tick {
                value: v as f64,
                label: v.to_string(),
                mark: Segment::new(
                    ScreenPoint::new(layout.margin - layout.tick_length, y),
                    ScreenPoint::new(layout.margin, y),
                ),
                label_anchor: ScreenPoint::new(layout.margin - layout.y_label_offset, y + layout.tick_length),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(pairs: &[(f64, f64)]) -> Vec<Sample> {
        pairs.iter().map(|&(t, v)| Sample::new(t, v)).collect()
    }

    fn geometry(pairs: &[(f64, f64)]) -> CurveGeometry {
        match map_curve(&samples(pairs), CanvasSize::new(500.0, 300.0), &ChartLayout::default()) {
            CurvePlot::Curve(g) => g,
            CurvePlot::NoData => panic!("expected a curve"),
        }
    }

    #[test]
    fn test_polyline_follows_input_order() {
        let g = geometry(&[(2.0, 1.0), (0.0, 3.0), (1.0, -2.0), (3.0, 0.5)]);
        assert_eq!(g.path.len(), 4);
        assert!(matches!(g.path[0], PathCommand::MoveTo(_)));
        assert!(g.path[1..].iter().all(|c| matches!(c, PathCommand::LineTo(_))));

        let xs: Vec<f64> = g.points().iter().map(|p| p.x).collect();
        // t = 2, 0, 1, 3 over a range of 3 and a draw width of 400
        let expected = [50.0 + 400.0 * 2.0 / 3.0, 50.0, 50.0 + 400.0 / 3.0, 450.0];
        for (x, e) in xs.iter().zip(expected) {
            assert!((x - e).abs() < 1e-9);
        }
    }

    #[test]
    fn test_too_few_samples_is_no_data() {
        let layout = ChartLayout::default();
        let canvas = CanvasSize::new(500.0, 300.0);
        assert_eq!(map_curve(&[], canvas, &layout), CurvePlot::NoData);
        assert_eq!(map_curve(&samples(&[(0.0, 1.0)]), canvas, &layout), CurvePlot::NoData);
        // Non-finite entries do not count towards the minimum
        assert_eq!(
            map_curve(&samples(&[(0.0, 1.0), (1.0, f64::NAN)]), canvas, &layout),
            CurvePlot::NoData
        );
    }

    #[test]
    fn test_flat_zero_signal_normalizes_to_zero() {
        let g = geometry(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        assert!(g.normalized.iter().all(|n| n.normalized_value == 0.0));
        // normalized zero sits in the vertical centre of the draw area
        assert!(g.points().iter().all(|p| (p.y - 150.0).abs() < 1e-9));
        let zero = g.zero_line.expect("zero line for a flat zero signal");
        assert!((zero.start.y - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_instant_falls_back_to_unit_range() {
        let g = geometry(&[(4.0, 1.0), (4.0, -1.0), (4.0, 0.0)]);
        assert!(g.points().iter().all(|p| p.x == 50.0));
        // unit fallback range gives ticks at t and t + 1
        assert_eq!(g.x_ticks.len(), 2);
        assert_eq!(g.x_ticks[0].label, "4");
        assert_eq!(g.x_ticks[1].label, "5");
    }

    #[test]
    fn test_zero_line_visibility_uses_raw_range() {
        assert!(geometry(&[(0.0, -2.0), (1.0, 3.0)]).zero_line.is_some());
        assert!(geometry(&[(0.0, 1.0), (1.0, 5.0)]).zero_line.is_none());
        assert!(geometry(&[(0.0, -4.0), (1.0, -1.0)]).zero_line.is_none());
    }

    #[test]
    fn test_zero_line_position_follows_raw_range() {
        // raw range -2..3 puts zero two fifths of the way up the draw height
        let g = geometry(&[(0.0, -2.0), (1.0, 3.0)]);
        let zero = g.zero_line.unwrap();
        assert!((zero.start.y - (50.0 + 200.0 - 0.4 * 200.0)).abs() < 1e-9);
        assert_eq!(zero.start.x, 50.0);
        assert_eq!(zero.end.x, 450.0);
    }

    #[test]
    fn test_end_to_end_example() {
        let g = geometry(&[(0.0, 1.0), (1.0, -1.0), (2.0, 0.0)]);
        assert_eq!(g.bounds.min_y, -1.0);
        assert_eq!(g.bounds.max_y, 1.0);
        let values: Vec<f64> = g.normalized.iter().map(|n| n.normalized_value).collect();
        assert_eq!(values, vec![1.0, -1.0, 0.0]);
        assert!(g.zero_line.is_some());

        let points = g.points();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0], ScreenPoint::new(50.0, 50.0));
        assert_eq!(points[1], ScreenPoint::new(250.0, 250.0));
        assert_eq!(points[2], ScreenPoint::new(450.0, 150.0));
    }

    #[test]
    fn test_ticks_and_axes() {
        let g = geometry(&[(0.0, 1.0), (1.0, -1.0), (2.6, 0.0)]);
        let labels: Vec<&str> = g.x_ticks.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["0", "1", "2"]);
        assert_eq!(g.x_ticks[1].mark.start.y, 250.0);
        assert_eq!(g.x_ticks[1].mark.end.y, 258.0);
        assert_eq!(g.x_ticks[1].label_anchor.y, 290.0);

        let y_labels: Vec<&str> = g.y_ticks.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(y_labels, vec!["-1", "0", "1"]);
        assert_eq!(g.y_ticks[0].mark.end, ScreenPoint::new(50.0, 250.0));
        assert_eq!(g.y_ticks[2].mark.end, ScreenPoint::new(50.0, 50.0));

        assert_eq!(g.x_axis.start, ScreenPoint::new(50.0, 250.0));
        assert_eq!(g.x_axis.end, ScreenPoint::new(450.0, 250.0));
        assert_eq!(g.y_axis.start, ScreenPoint::new(50.0, 50.0));
    }

    #[test]
    fn test_x_ticks_are_capped() {
        let g = geometry(&[(0.0, 1.0), (50_000.0, 2.0)]);
        assert_eq!(g.x_ticks.len(), MAX_X_TICKS);
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let pairs = [(0.0, 0.3), (0.5, -0.7), (1.5, 0.1)];
        assert_eq!(geometry(&pairs), geometry(&pairs));
    }

    #[test]
    fn test_parse_skips_malformed_points() {
        let raw = r#"[
            {"t": 0.0, "v": "1.5"},
            {"t": 0.1, "v": 2},
            {"t": 0.2, "v": "abc"},
            {"v": "1"},
            {"t": 0.3, "v": "NaN"},
            "garbage",
            {"t": 0.4, "v": "-0.25"}
        ]"#;
        let parsed = parse_curve_json(raw);
        assert_eq!(
            parsed.samples,
            vec![Sample::new(0.0, 1.5), Sample::new(0.1, 2.0), Sample::new(0.4, -0.25)]
        );
        assert_eq!(parsed.dropped, 4);
    }

    #[test]
    fn test_parse_accepts_numeric_string_times() {
        let parsed = parse_curve_json(r#"[{"t": "0.5", "v": 1}, {"t": " 1 ", "v": "-1"}, {"t": "x", "v": 1}]"#);
        assert_eq!(parsed.samples, vec![Sample::new(0.5, 1.0), Sample::new(1.0, -1.0)]);
        assert_eq!(parsed.dropped, 1);
    }

    #[test]
    fn test_layout_fits_only_canvases_wider_than_margins() {
        let layout = ChartLayout::default();
        assert!(layout.fits(CanvasSize::new(500.0, 300.0)));
        assert!(layout.fits(CanvasSize::new(101.0, 101.0)));
        assert!(!layout.fits(CanvasSize::new(100.0, 300.0)));
        assert!(!layout.fits(CanvasSize::new(500.0, 60.0)));
        assert!(!layout.fits(CanvasSize::new(0.0, 0.0)));
        assert!(!layout.fits(CanvasSize::new(f64::INFINITY, 300.0)));
    }

    #[test]
    fn test_parse_unreadable_input_is_empty() {
        assert_eq!(parse_curve_json(""), ParsedCurve::default());
        assert_eq!(parse_curve_json("[]"), ParsedCurve::default());
        assert_eq!(parse_curve_json("{not json"), ParsedCurve::default());
        assert_eq!(parse_curve_json(r#"{"t": 1}"#), ParsedCurve::default());
    }
}
