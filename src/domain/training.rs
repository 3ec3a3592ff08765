// Training history domain model
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which persisted upload flag a sync pathway drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    Metadata,
    Csv,
    Video,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRecord {
    #[serde(rename = "trainingID")]
    pub training_id: String,
    pub training_label: String,
    /// Epoch milliseconds
    pub create_at: i64,
    pub finish_at: i64,
    pub target_times: u32,
    pub achieved_times: u32,
    /// Seconds
    pub duration_time: u32,
    #[serde(default)]
    pub curve_json: String,
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub csv_uploaded: bool,
    #[serde(default)]
    pub csv_file_name: String,
    #[serde(default)]
    pub self_report_count: Option<u32>,
    #[serde(default)]
    pub video_uploaded: bool,
    #[serde(default)]
    pub video_file_name: String,
}

impl TrainingRecord {
    pub fn local_day(&self) -> Option<NaiveDate> {
        DateTime::from_timestamp_millis(self.create_at)
            .map(|t| t.with_timezone(&Local).date_naive())
    }

    pub fn is_uploaded(&self, kind: SyncKind) -> bool {
        match kind {
            SyncKind::Metadata => self.synced,
            SyncKind::Csv => self.csv_uploaded,
            SyncKind::Video => self.video_uploaded,
        }
    }

    /// Still waiting on the given channel. CSV and video rows need a file to upload.
    pub fn needs_upload(&self, kind: SyncKind) -> bool {
        if self.is_uploaded(kind) {
            return false;
        }
        match kind {
            SyncKind::Metadata => true,
            SyncKind::Csv => !self.csv_file_name.is_empty(),
            SyncKind::Video => !self.video_file_name.is_empty(),
        }
    }

    pub fn mark_uploaded(&mut self, kind: SyncKind) {
        match kind {
            SyncKind::Metadata => self.synced = true,
            SyncKind::Csv => self.csv_uploaded = true,
            SyncKind::Video => self.video_uploaded = true,
        }
    }

    pub fn label(&self) -> TrainingLabel {
        TrainingLabel::parse(&self.training_label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainingLabel {
    PuffCheek,
    ReduceCheek,
    PoutLips,
    SipLips,
    TongueLeft,
    TongueRight,
    TongueUp,
    TongueDown,
    TongueFoward,
    TongueBack,
    JawLeft,
    JawRight,
    Other,
}

impl TrainingLabel {
    const ALL: [TrainingLabel; 12] = [
        TrainingLabel::PuffCheek,
        TrainingLabel::ReduceCheek,
        TrainingLabel::PoutLips,
        TrainingLabel::SipLips,
        TrainingLabel::TongueLeft,
        TrainingLabel::TongueRight,
        TrainingLabel::TongueUp,
        TrainingLabel::TongueDown,
        TrainingLabel::TongueFoward,
        TrainingLabel::TongueBack,
        TrainingLabel::JawLeft,
        TrainingLabel::JawRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingLabel::PuffCheek => "PUFF_CHEEK",
            TrainingLabel::ReduceCheek => "REDUCE_CHEEK",
            TrainingLabel::PoutLips => "POUT_LIPS",
            TrainingLabel::SipLips => "SIP_LIPS",
            TrainingLabel::TongueLeft => "TONGUE_LEFT",
            TrainingLabel::TongueRight => "TONGUE_RIGHT",
            TrainingLabel::TongueUp => "TONGUE_UP",
            TrainingLabel::TongueDown => "TONGUE_DOWN",
            // sic, matches labels already stored on devices
            TrainingLabel::TongueFoward => "TONGUE_FOWARD",
            TrainingLabel::TongueBack => "TONGUE_BACK",
            TrainingLabel::JawLeft => "JAW_LEFT",
            TrainingLabel::JawRight => "JAW_RIGHT",
            TrainingLabel::Other => "OTHER",
        }
    }

    pub fn parse(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(label.trim()))
            .unwrap_or(TrainingLabel::Other)
    }

    /// Recover the exercise from a recording file name such as
    /// `user01_FaceTraining_POUT_LIPS_20260106_204032.csv`.
    pub fn from_file_name(file_name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|l| file_name.contains(l.as_str()))
            .unwrap_or(TrainingLabel::Other)
    }
}

/// Display values for one entry of the results list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultCard {
    pub training_id: String,
    pub label: TrainingLabel,
    pub display_count: String,
    pub completion_percent: u32,
    pub self_reported: bool,
    pub duration_secs: u32,
    pub created_at: i64,
    pub has_curve: bool,
}

impl From<&TrainingRecord> for ResultCard {
    fn from(record: &TrainingRecord) -> Self {
        let completion_percent = if record.target_times > 0 {
            record.achieved_times.saturating_mul(100) / record.target_times
        } else {
            0
        };
        let shown = record.self_report_count.unwrap_or(record.achieved_times);

        Self {
            training_id: record.training_id.clone(),
            label: record.label(),
            display_count: format!("{}/{}", shown, record.target_times),
            completion_percent,
            self_reported: record.self_report_count.is_some(),
            duration_secs: record.duration_time,
            created_at: record.create_at,
            has_curve: !record.curve_json.trim().is_empty() && record.curve_json.trim() != "[]",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SelfReportError {
    #[error("no count entered")]
    Empty,
    #[error("count {0} is out of range")]
    OutOfRange(String),
}

/// Read a self-reported repetition count. Non-digits are ignored as the input box does.
pub fn parse_self_report(input: &str) -> Result<u32, SelfReportError> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(SelfReportError::Empty);
    }
    digits
        .parse::<u32>()
        .map_err(|_| SelfReportError::OutOfRange(digits))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TrainingRecord {
        TrainingRecord {
            training_id: "t-1".to_string(),
            training_label: "POUT_LIPS".to_string(),
            create_at: 1_767_700_000_000,
            finish_at: 1_767_700_030_000,
            target_times: 12,
            achieved_times: 9,
            duration_time: 30,
            curve_json: "[]".to_string(),
            synced: false,
            csv_uploaded: false,
            csv_file_name: String::new(),
            self_report_count: None,
            video_uploaded: false,
            video_file_name: String::new(),
        }
    }

    #[test]
    fn test_label_from_file_name() {
        assert_eq!(
            TrainingLabel::from_file_name("user01_FaceTraining_POUT_LIPS_20260106_204032.csv"),
            TrainingLabel::PoutLips
        );
        assert_eq!(
            TrainingLabel::from_file_name("guest_TONGUE_FOWARD_1.csv"),
            TrainingLabel::TongueFoward
        );
        assert_eq!(TrainingLabel::from_file_name("notes.csv"), TrainingLabel::Other);
        assert_eq!(TrainingLabel::parse("jaw_left"), TrainingLabel::JawLeft);
    }

    #[test]
    fn test_card_uses_recognized_count_until_self_reported() {
        let mut r = record();
        let card = ResultCard::from(&r);
        assert_eq!(card.display_count, "9/12");
        assert_eq!(card.completion_percent, 75);
        assert!(!card.self_reported);
        assert!(!card.has_curve);

        r.self_report_count = Some(11);
        let card = ResultCard::from(&r);
        assert_eq!(card.display_count, "11/12");
        // completion still reflects what was recognized
        assert_eq!(card.completion_percent, 75);
        assert!(card.self_reported);
    }

    #[test]
    fn test_card_with_zero_target() {
        let mut r = record();
        r.target_times = 0;
        assert_eq!(ResultCard::from(&r).completion_percent, 0);
    }

    #[test]
    fn test_needs_upload_requires_file_for_csv_and_video() {
        let mut r = record();
        assert!(r.needs_upload(SyncKind::Metadata));
        assert!(!r.needs_upload(SyncKind::Csv));
        assert!(!r.needs_upload(SyncKind::Video));

        r.video_file_name = "t-1.mp4".to_string();
        assert!(r.needs_upload(SyncKind::Video));
        r.mark_uploaded(SyncKind::Video);
        assert!(!r.needs_upload(SyncKind::Video));
    }

    #[test]
    fn test_parse_self_report() {
        assert_eq!(parse_self_report("12"), Ok(12));
        assert_eq!(parse_self_report(" 1a0 "), Ok(10));
        assert_eq!(parse_self_report("0"), Ok(0));
        assert_eq!(parse_self_report("abc"), Err(SelfReportError::Empty));
        assert!(matches!(
            parse_self_report("99999999999"),
            Err(SelfReportError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_record_json_shape() {
        let raw = r#"{
            "trainingID": "abc",
            "trainingLabel": "PUFF_CHEEK",
            "createAt": 1767700000000,
            "finishAt": 1767700030000,
            "targetTimes": 10,
            "achievedTimes": 4,
            "durationTime": 30,
            "csvFileName": "a_PUFF_CHEEK.csv"
        }"#;
        let r: TrainingRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(r.training_id, "abc");
        assert_eq!(r.self_report_count, None);
        assert!(r.needs_upload(SyncKind::Csv));
        assert_eq!(r.label(), TrainingLabel::PuffCheek);
    }
}
