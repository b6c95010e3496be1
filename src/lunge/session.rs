use std::collections::HashMap;

use serde::Serialize;

/// 記録ウィンドウ中のフォーム集計
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionReport {
    /// 記録開始後に処理したフレーム数
    pub total_frames: u64,
    pub good_form_frames: u64,
    pub error_counts: HashMap<String, u64>,
    /// 記録が始まったフレームのインデックス
    pub recording_start: Option<u64>,
}

impl SessionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.recording_start.is_some()
    }

    /// Opens the recording window. Later calls keep the first start index.
    pub fn start_recording(&mut self, frame_index: u64) -> bool {
        if self.recording_start.is_some() {
            return false;
        }
        self.recording_start = Some(frame_index);
        true
    }

    /// Accumulates one analyzed frame. An empty label list is a good-form frame.
    pub fn record<S: AsRef<str>>(&mut self, labels: &[S]) {
        if !self.is_recording() {
            return;
        }
        self.total_frames += 1;
        if labels.is_empty() {
            self.good_form_frames += 1;
            return;
        }
        for label in labels {
            *self.error_counts.entry(label.as_ref().to_string()).or_insert(0) += 1;
        }
    }

    /// A frame that only advances the session clock (no person in view).
    pub fn record_missing(&mut self) {
        if self.is_recording() {
            self.total_frames += 1;
        }
    }

    /// 頻度の降順。同数はラベル順
    pub fn sorted_errors(&self) -> Vec<(&str, u64)> {
        let mut errors: Vec<(&str, u64)> = self
            .error_counts
            .iter()
            .map(|(label, &count)| (label.as_str(), count))
            .collect();
        errors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        errors
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
