use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::classifier::{Classification, FormClassifier};
use super::reps::RepCounter;
use super::report::{self, ReportContext};
use super::rules::{self, FormError};
use super::session::SessionReport;
use super::side::{CanonicalMeasurement, SideNormalizer};
use crate::config::Config;
use crate::error::{ConfigError, FrameError};
use crate::pose::{PoseFrame, RawLandmark};

/// 遮蔽中に報告する前膝角度（完全伸展）
pub const OCCLUDED_KNEE_ANGLE: f32 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameStatus {
    /// 姿勢推定器が人物を見つけられなかった
    NoPerson,
    /// 記録開始前のカウントダウン中
    WarmingUp,
    /// 人物はいるが必須キーポイントが見えていない
    OutOfView,
    Analyzed,
}

/// Per-frame output handed to rendering or transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameVerdict {
    pub frame_index: Option<u64>,
    pub status: FrameStatus,
    /// 違反ラベル（最大 `max_errors` 件）
    pub errors: Vec<String>,
    pub front_knee_angle: Option<f32>,
    pub front_is_left: Option<bool>,
    pub rep_count: u32,
    pub target_reps: u32,
    pub shallow_reps: u32,
    pub good_form_frames: u64,
    pub error_counts: BTreeMap<String, u64>,
    pub recording_active: bool,
    pub recorded_frames: u64,
    /// ウォームアップ中の残り秒数
    pub countdown_secs: Option<u64>,
    pub classification: Option<Classification>,
}

/// One exercise session: normalize → evaluate → count reps → aggregate.
///
/// Owns every piece of mutable state; run one instance per session.
pub struct LungeAnalyzer {
    config: Config,
    normalizer: SideNormalizer,
    reps: RepCounter,
    session: SessionReport,
    classifier: Option<Box<dyn FormClassifier>>,
    /// 人物が検出されたフレーム数（ウォームアップ判定用）
    detected_frames: u64,
}

impl LungeAnalyzer {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            normalizer: SideNormalizer::new(config.analysis.visibility_threshold),
            reps: RepCounter::new(config.reps.clone())?,
            session: SessionReport::new(),
            classifier: None,
            detected_frames: 0,
            config,
        })
    }

    /// Attaches an external whole-frame scorer. Its verdict is reported alongside
    /// the rule labels and never changes them.
    pub fn with_classifier(mut self, classifier: Box<dyn FormClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &SessionReport {
        &self.session
    }

    pub fn rep_counter(&self) -> &RepCounter {
        &self.reps
    }

    /// `None` means the pose source found nobody in the image.
    pub fn process(&mut self, frame: Option<&PoseFrame>) -> FrameVerdict {
        match frame {
            Some(frame) => self.process_detected(frame.frame_index, Ok(frame)),
            None => self.process_missing(None),
        }
    }

    /// Raw BlazePose landmarks straight from the detector.
    pub fn process_landmarks(
        &mut self,
        frame_index: u64,
        landmarks: Option<&[RawLandmark]>,
    ) -> FrameVerdict {
        match landmarks {
            None => self.process_missing(Some(frame_index)),
            Some(landmarks) => match PoseFrame::from_landmarks(frame_index, landmarks) {
                Ok(frame) => self.process_detected(frame_index, Ok(&frame)),
                Err(err) => self.process_detected(frame_index, Err(err)),
            },
        }
    }

    fn process_missing(&mut self, frame_index: Option<u64>) -> FrameVerdict {
        if self.config.analysis.count_missing_frames {
            self.session.record_missing();
        }
        self.verdict(frame_index, FrameStatus::NoPerson)
    }

    fn process_detected(
        &mut self,
        frame_index: u64,
        frame: Result<&PoseFrame, FrameError>,
    ) -> FrameVerdict {
        self.detected_frames += 1;

        let warmup_frames = self.config.session.warmup_frames();
        if self.detected_frames <= warmup_frames {
            let fps = u64::from(self.config.session.fps);
            let mut verdict = self.verdict(Some(frame_index), FrameStatus::WarmingUp);
            verdict.countdown_secs =
                Some((warmup_frames / fps).saturating_sub(self.detected_frames / fps));
            return verdict;
        }

        if self.session.start_recording(frame_index) {
            info!(frame_index, "recording started");
        }

        let normalizer = &self.normalizer;
        let (status, errors, knee_angle, front_is_left, classification) =
            match frame.and_then(|f| normalizer.normalize(f)) {
                Ok(m) => {
                    let errors =
                        rules::evaluate(&m, &self.config.thresholds, self.config.analysis.max_errors);
                    self.reps.update(m.front_knee_angle);
                    let classification = self.classify(&m);
                    (
                        FrameStatus::Analyzed,
                        errors,
                        m.front_knee_angle,
                        Some(m.front_is_left),
                        classification,
                    )
                }
                Err(err) => {
                    debug!(frame_index, %err, "landmarks incomplete");
                    (
                        FrameStatus::OutOfView,
                        vec![FormError::OutOfView],
                        OCCLUDED_KNEE_ANGLE,
                        None,
                        None,
                    )
                }
            };

        let labels: Vec<&'static str> = errors.iter().map(|e| e.label()).collect();
        self.session.record(&labels);

        let mut verdict = self.verdict(Some(frame_index), status);
        verdict.errors = labels.iter().map(|l| l.to_string()).collect();
        verdict.front_knee_angle = Some(knee_angle);
        verdict.front_is_left = front_is_left;
        verdict.classification = classification;
        verdict
    }

    fn classify(&mut self, m: &CanonicalMeasurement) -> Option<Classification> {
        let classifier = self.classifier.as_mut()?;
        match classifier.classify(m) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("form classifier failed: {:#}", e);
                None
            }
        }
    }

    fn verdict(&self, frame_index: Option<u64>, status: FrameStatus) -> FrameVerdict {
        FrameVerdict {
            frame_index,
            status,
            errors: Vec::new(),
            front_knee_angle: None,
            front_is_left: None,
            rep_count: self.reps.reps(),
            target_reps: self.config.session.target_reps,
            shallow_reps: self.reps.shallow_reps(),
            good_form_frames: self.session.good_form_frames,
            error_counts: self
                .session
                .error_counts
                .iter()
                .map(|(label, &count)| (label.clone(), count))
                .collect(),
            recording_active: self.session.is_recording(),
            recorded_frames: self.session.total_frames,
            countdown_secs: None,
            classification: None,
        }
    }

    /// Clears rep state, warm-up progress and the report accumulators.
    pub fn reset(&mut self) {
        self.reps.reset();
        self.session.reset();
        self.detected_frames = 0;
        info!("{} analyzer counters reset", self.config.session.exercise);
    }

    pub fn report(&self) -> String {
        report::render(
            &self.session,
            &ReportContext {
                exercise: &self.config.session.exercise,
                fps: self.config.session.fps,
                reps: self.reps.reps(),
                target_reps: self.config.session.target_reps,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lunge::classifier::RuleClassifier;
    use crate::lunge::reps::tests::lunge_cycle;
    use crate::lunge::report::NOT_RECORDED;
    use crate::lunge::rules::ThresholdTable;
    use crate::lunge::side::tests::FrameBuilder;
    use crate::pose::Joint;

    fn config(warmup_seconds: u32) -> Config {
        let mut config = Config::default();
        config.session.warmup_seconds = warmup_seconds;
        config
    }

    /// 全ルールを満たす姿勢（前膝 90°、後膝 ≈ 101°、胴体 90°）
    fn compliant(frame_index: u64) -> PoseFrame {
        FrameBuilder::lunge_left_front()
            .set(Joint::LeftShoulder, 0.2, 0.45)
            .set(Joint::RightShoulder, 0.2, 0.55)
            .set(Joint::RightKnee, 0.60, 0.75)
            .set(Joint::RightAnkle, 0.85, 0.75)
            .build(frame_index)
    }

    /// 前膝だけが曲がりすぎ（≈ 78.7°）
    fn knee_too_bent(frame_index: u64) -> PoseFrame {
        FrameBuilder::lunge_left_front()
            .set(Joint::LeftShoulder, 0.2, 0.45)
            .set(Joint::RightShoulder, 0.2, 0.55)
            .set(Joint::RightKnee, 0.60, 0.75)
            .set(Joint::RightAnkle, 0.85, 0.75)
            .set(Joint::LeftHip, 0.45, 0.53)
            .build(frame_index)
    }

    /// 後脚を伸ばし、前膝角度を `angle` にした姿勢
    fn front_knee_at(frame_index: u64, angle: f32) -> PoseFrame {
        let (sin, cos) = angle.to_radians().sin_cos();
        FrameBuilder::lunge_left_front()
            .set(Joint::LeftHip, 0.30 + 0.15 * sin, 0.5 + 0.15 * cos)
            .set(Joint::RightHip, 0.55, 0.5)
            .set(Joint::RightKnee, 0.56, 0.7)
            .set(Joint::RightAnkle, 0.57, 0.9)
            .build(frame_index)
    }

    fn replay(analyzer: &mut LungeAnalyzer, angles: &[f32]) -> Vec<FrameVerdict> {
        angles
            .iter()
            .enumerate()
            .map(|(i, &a)| analyzer.process(Some(&front_knee_at(i as u64, a))))
            .collect()
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let mut config = Config::default();
        config.thresholds.front_knee_angle = rules::Range::new(100.0, 80.0);
        assert!(LungeAnalyzer::new(config).is_err());
    }

    #[test]
    fn test_compliant_frame_has_no_errors() {
        let mut analyzer = LungeAnalyzer::new(config(0)).unwrap();
        let v = analyzer.process(Some(&compliant(0)));
        assert_eq!(v.status, FrameStatus::Analyzed);
        assert!(v.errors.is_empty(), "{:?}", v.errors);
        assert!((v.front_knee_angle.unwrap() - 90.0).abs() < 1e-3);
        assert_eq!(v.front_is_left, Some(true));
        assert_eq!(v.good_form_frames, 1);
        assert!(v.recording_active);
    }

    #[test]
    fn test_end_to_end_sixty_frames() {
        let mut analyzer = LungeAnalyzer::new(config(0)).unwrap();
        let mut last = None;
        for i in 0..60u64 {
            let frame = if i < 20 { compliant(i) } else { knee_too_bent(i) };
            last = Some(analyzer.process(Some(&frame)));
        }
        let v = last.unwrap();
        assert_eq!(v.errors, vec!["Front knee bent too much".to_string()]);
        assert_eq!(v.good_form_frames, 20);
        assert_eq!(v.recorded_frames, 60);
        assert_eq!(v.error_counts.len(), 1);
        assert_eq!(v.error_counts["Front knee bent too much"], 40);

        let text = analyzer.report();
        assert!(text.contains("Total Recorded Time: 2.00 seconds"), "{}", text);
        assert!(text.contains("Good Form Duration: 0.67 seconds (33.3%)"), "{}", text);
        assert!(!text.contains("Good Form Duration: 0.67 seconds (66.7%)"));
    }

    #[test]
    fn test_warmup_countdown_then_recording() {
        let mut analyzer = LungeAnalyzer::new(config(3)).unwrap();
        let first = analyzer.process(Some(&compliant(0)));
        assert_eq!(first.status, FrameStatus::WarmingUp);
        assert_eq!(first.countdown_secs, Some(3));
        assert!(!first.recording_active);

        let mut v = first;
        for i in 1..90 {
            v = analyzer.process(Some(&compliant(i)));
        }
        assert_eq!(v.status, FrameStatus::WarmingUp);
        assert_eq!(v.countdown_secs, Some(0));
        assert_eq!(analyzer.report(), NOT_RECORDED);

        let v = analyzer.process(Some(&compliant(90)));
        assert_eq!(v.status, FrameStatus::Analyzed);
        assert!(v.recording_active);
        assert_eq!(v.countdown_secs, None);
        assert_eq!(v.recorded_frames, 1);
        assert_eq!(analyzer.session().recording_start, Some(90));
    }

    #[test]
    fn test_no_person_does_not_advance_warmup() {
        let mut analyzer = LungeAnalyzer::new(config(1)).unwrap();
        for _ in 0..100 {
            let v = analyzer.process(None);
            assert_eq!(v.status, FrameStatus::NoPerson);
            assert!(v.errors.is_empty());
            assert_eq!(v.front_knee_angle, None);
        }
        let v = analyzer.process(Some(&compliant(100)));
        assert_eq!(v.status, FrameStatus::WarmingUp);
    }

    #[test]
    fn test_no_person_counting_policy() {
        let mut ignored = LungeAnalyzer::new(config(0)).unwrap();
        ignored.process(Some(&compliant(0)));
        ignored.process(None);
        assert_eq!(ignored.session().total_frames, 1);

        let mut cfg = config(0);
        cfg.analysis.count_missing_frames = true;
        let mut counted = LungeAnalyzer::new(cfg).unwrap();
        counted.process(None);
        assert_eq!(counted.session().total_frames, 0, "not recording yet");
        counted.process(Some(&compliant(1)));
        counted.process(None);
        assert_eq!(counted.session().total_frames, 2);
        assert_eq!(counted.session().good_form_frames, 1);
    }

    #[test]
    fn test_occluded_frame_reports_advisory() {
        let mut analyzer = LungeAnalyzer::new(config(0)).unwrap();
        let frame = FrameBuilder::lunge_left_front()
            .visibility(Joint::LeftAnkle, 0.2)
            .build(0);
        let v = analyzer.process(Some(&frame));
        assert_eq!(v.status, FrameStatus::OutOfView);
        assert_eq!(v.errors, vec!["Move fully into camera view".to_string()]);
        assert_eq!(v.front_knee_angle, Some(OCCLUDED_KNEE_ANGLE));
        assert_eq!(v.error_counts["Move fully into camera view"], 1);
        // 遮蔽フレームはレップ判定に入らない
        assert_eq!(analyzer.rep_counter().history_len(), 0);
    }

    #[test]
    fn test_process_landmarks_truncated_set_is_out_of_view() {
        let mut analyzer = LungeAnalyzer::new(config(0)).unwrap();
        let partial = vec![RawLandmark::new(0.5, 0.5, 0.0, 0.9); 20];
        let v = analyzer.process_landmarks(3, Some(partial.as_slice()));
        assert_eq!(v.status, FrameStatus::OutOfView);
        assert_eq!(v.frame_index, Some(3));

        let v = analyzer.process_landmarks(4, None);
        assert_eq!(v.status, FrameStatus::NoPerson);
        assert_eq!(v.frame_index, Some(4));
    }

    #[test]
    fn test_process_landmarks_full_set() {
        let mut analyzer = LungeAnalyzer::new(config(0)).unwrap();
        let frame = compliant(0);
        let mut landmarks = vec![RawLandmark::new(0.0, 0.0, 0.0, 0.1); 33];
        for joint in Joint::ALL {
            let kp = frame.get(joint);
            landmarks[joint.landmark_index()] = RawLandmark::new(kp.x, kp.y, 0.0, kp.visibility);
        }
        let v = analyzer.process_landmarks(0, Some(landmarks.as_slice()));
        assert_eq!(v.status, FrameStatus::Analyzed);
        assert!(v.errors.is_empty(), "{:?}", v.errors);
    }

    #[test]
    fn test_reps_counted_through_pipeline() {
        let mut analyzer = LungeAnalyzer::new(config(0)).unwrap();
        let verdicts = replay(&mut analyzer, &lunge_cycle(70.0, 6));
        let last = verdicts.last().unwrap();
        assert_eq!(last.rep_count, 1);
        assert_eq!(last.target_reps, 8);
        assert!((analyzer.rep_counter().deepest_angle() - 70.0).abs() < 0.1);
    }

    #[test]
    fn test_reset_then_replay_is_idempotent() {
        let mut angles = lunge_cycle(75.0, 6);
        angles.extend(lunge_cycle(85.0, 6));

        let mut analyzer = LungeAnalyzer::new(config(0)).unwrap();
        replay(&mut analyzer, &angles);
        analyzer.reset();
        assert_eq!(analyzer.report(), NOT_RECORDED);
        assert_eq!(analyzer.rep_counter().reps(), 0);

        let first = replay(&mut analyzer, &angles);
        let first_report = analyzer.report();
        analyzer.reset();
        let second = replay(&mut analyzer, &angles);
        let second_report = analyzer.report();

        assert_eq!(first.last().unwrap().rep_count, 2);
        assert_eq!(first, second);
        assert_eq!(first_report, second_report);
    }

    #[test]
    fn test_rule_classifier_attached() {
        let mut analyzer = LungeAnalyzer::new(config(0))
            .unwrap()
            .with_classifier(Box::new(RuleClassifier::new(ThresholdTable::default())));
        let v = analyzer.process(Some(&compliant(0)));
        let c = v.classification.unwrap();
        assert!(c.is_correct);

        let v = analyzer.process(Some(&knee_too_bent(1)));
        assert!(!v.classification.unwrap().is_correct);
    }

    struct OfflineClassifier;

    impl FormClassifier for OfflineClassifier {
        fn classify(&mut self, _: &CanonicalMeasurement) -> anyhow::Result<Classification> {
            anyhow::bail!("model offline")
        }
    }

    #[test]
    fn test_classifier_failure_is_not_fatal() {
        let mut analyzer = LungeAnalyzer::new(config(0))
            .unwrap()
            .with_classifier(Box::new(OfflineClassifier));
        let v = analyzer.process(Some(&compliant(0)));
        assert_eq!(v.status, FrameStatus::Analyzed);
        assert!(v.classification.is_none());
        assert_eq!(v.good_form_frames, 1);
    }

    #[test]
    fn test_verdict_serializes_to_json() {
        let mut analyzer = LungeAnalyzer::new(config(0)).unwrap();
        let v = analyzer.process(Some(&knee_too_bent(0)));
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["status"], "Analyzed");
        assert_eq!(json["errors"][0], "Front knee bent too much");
        assert_eq!(json["error_counts"]["Front knee bent too much"], 1);
        assert_eq!(json["recording_active"], true);
    }
}
