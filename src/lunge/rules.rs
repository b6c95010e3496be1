use std::fmt;

use serde::{Deserialize, Serialize};

use super::side::CanonicalMeasurement;

/// Inclusive acceptable range. Written as `[min, max]` in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f32, f32)", into = "(f32, f32)")]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn is_below(&self, value: f32) -> bool {
        value < self.min
    }

    pub fn is_above(&self, value: f32) -> bool {
        value > self.max
    }

    pub fn contains(&self, value: f32) -> bool {
        !self.is_below(value) && !self.is_above(value)
    }
}

impl From<(f32, f32)> for Range {
    fn from((min, max): (f32, f32)) -> Self {
        Self::new(min, max)
    }
}

impl From<Range> for (f32, f32) {
    fn from(range: Range) -> Self {
        (range.min, range.max)
    }
}

/// 指標ごとの許容範囲
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    #[serde(default = "default_front_knee_angle")]
    pub front_knee_angle: Range,
    #[serde(default = "default_back_knee_angle")]
    pub back_knee_angle: Range,
    #[serde(default = "default_torso_angle")]
    pub torso_angle: Range,
    /// 左右の腰の高さの差。下限は使わない
    #[serde(default = "default_hip_level")]
    pub hip_level: Range,
    #[serde(default = "default_stance_width")]
    pub stance_width: Range,
}

fn default_front_knee_angle() -> Range { Range::new(80.0, 100.0) }
fn default_back_knee_angle() -> Range { Range::new(75.0, 115.0) }
fn default_torso_angle() -> Range { Range::new(70.0, 110.0) }
fn default_hip_level() -> Range { Range::new(0.0, 0.15) }
fn default_stance_width() -> Range { Range::new(0.2, 0.6) }

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            front_knee_angle: default_front_knee_angle(),
            back_knee_angle: default_back_knee_angle(),
            torso_angle: default_torso_angle(),
            hip_level: default_hip_level(),
            stance_width: default_stance_width(),
        }
    }
}

/// One violated form rule. Each maps to exactly one user-facing label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormError {
    BendFrontKneeMore,
    FrontKneeBentTooMuch,
    FrontKneePastToes,
    BendBackKneeMore,
    BackKneeBentTooMuch,
    TorsoNotUpright,
    HipsNotLevel,
    StanceTooNarrow,
    StanceTooWide,
    /// 必須キーポイントが見えていない
    OutOfView,
}

impl FormError {
    pub fn label(self) -> &'static str {
        match self {
            Self::BendFrontKneeMore => "Bend front knee more",
            Self::FrontKneeBentTooMuch => "Front knee bent too much",
            Self::FrontKneePastToes => "Front knee past toes",
            Self::BendBackKneeMore => "Bend back knee more",
            Self::BackKneeBentTooMuch => "Back knee bent too much",
            Self::TorsoNotUpright => "Keep torso upright",
            Self::HipsNotLevel => "Keep hips level",
            Self::StanceTooNarrow => "Increase stance width",
            Self::StanceTooWide => "Reduce stance width",
            Self::OutOfView => "Move fully into camera view",
        }
    }
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Number of independent checks `evaluate` runs.
pub const RULE_COUNT: usize = 6;

/// 固定順のチェックリストで違反を列挙し、先頭 `max_errors` 件を返す
///
/// front knee → knee past toe → back knee → torso → hip level → stance width
pub fn evaluate(m: &CanonicalMeasurement, table: &ThresholdTable, max_errors: usize) -> Vec<FormError> {
    let mut errors = violations(m, table);
    errors.truncate(max_errors);
    errors
}

/// All violations, untruncated.
pub(crate) fn violations(m: &CanonicalMeasurement, table: &ThresholdTable) -> Vec<FormError> {
    let mut errors = Vec::with_capacity(RULE_COUNT);

    if table.front_knee_angle.is_above(m.front_knee_angle) {
        errors.push(FormError::BendFrontKneeMore);
    } else if table.front_knee_angle.is_below(m.front_knee_angle) {
        errors.push(FormError::FrontKneeBentTooMuch);
    }

    if m.knee_past_toe {
        errors.push(FormError::FrontKneePastToes);
    }

    if table.back_knee_angle.is_above(m.back_knee_angle) {
        errors.push(FormError::BendBackKneeMore);
    } else if table.back_knee_angle.is_below(m.back_knee_angle) {
        errors.push(FormError::BackKneeBentTooMuch);
    }

    if !table.torso_angle.contains(m.torso_angle) {
        errors.push(FormError::TorsoNotUpright);
    }

    if table.hip_level.is_above(m.hip_level_diff) {
        errors.push(FormError::HipsNotLevel);
    }

    if table.stance_width.is_below(m.stance_width) {
        errors.push(FormError::StanceTooNarrow);
    } else if table.stance_width.is_above(m.stance_width) {
        errors.push(FormError::StanceTooWide);
    }

    errors
}
