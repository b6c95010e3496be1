use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::lunge::rules::{Range, ThresholdTable};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub thresholds: ThresholdTable,
    #[serde(default)]
    pub reps: RepConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// 必須キーポイントの可視性閾値 (0.0〜1.0)
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f32,
    /// 1フレームで返すエラーラベルの上限
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,
    /// 人物未検出フレームを記録中の総フレーム数に含めるか
    #[serde(default)]
    pub count_missing_frames: bool,
}

fn default_visibility_threshold() -> f32 { 0.6 }
fn default_max_errors() -> usize { 3 }

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            visibility_threshold: default_visibility_threshold(),
            max_errors: default_max_errors(),
            count_missing_frames: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepConfig {
    /// 膝角度履歴の最大長
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// 平滑化・微分に使うサンプル数
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,
    /// 方向判定のヒステリシス幅（度）
    #[serde(default = "default_hysteresis")]
    pub hysteresis: f32,
    /// ランジ開始と判定する平滑化角度（度）
    #[serde(default = "default_entry_angle")]
    pub entry_angle: f32,
    /// レップとして数える最深角度（度）
    #[serde(default = "default_depth_angle")]
    pub depth_angle: f32,
    /// ランジ終了と判定する平滑化角度（度）
    #[serde(default = "default_exit_angle")]
    pub exit_angle: f32,
    /// 終了判定に必要な上昇フェーズのフレーム数
    #[serde(default = "default_exit_debounce_frames")]
    pub exit_debounce_frames: u32,
}

fn default_history_size() -> usize { 10 }
fn default_smoothing_window() -> usize { 5 }
fn default_hysteresis() -> f32 { 3.0 }
fn default_entry_angle() -> f32 { 110.0 }
fn default_depth_angle() -> f32 { 110.0 }
fn default_exit_angle() -> f32 { 140.0 }
fn default_exit_debounce_frames() -> u32 { 5 }

impl Default for RepConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            smoothing_window: default_smoothing_window(),
            hysteresis: default_hysteresis(),
            entry_angle: default_entry_angle(),
            depth_angle: default_depth_angle(),
            exit_angle: default_exit_angle(),
            exit_debounce_frames: default_exit_debounce_frames(),
        }
    }
}

impl RepConfig {
    /// 履歴長・窓幅・角度の整合性を検査する
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.smoothing_window < 2 {
            return Err(ConfigError::invalid("reps.smoothing_window", "must be at least 2"));
        }
        if self.smoothing_window > self.history_size {
            return Err(ConfigError::invalid(
                "reps.smoothing_window",
                "must not exceed reps.history_size",
            ));
        }
        if !self.hysteresis.is_finite() || self.hysteresis < 0.0 {
            return Err(ConfigError::invalid("reps.hysteresis", "must be a non-negative number"));
        }
        for (name, angle) in [
            ("reps.entry_angle", self.entry_angle),
            ("reps.depth_angle", self.depth_angle),
            ("reps.exit_angle", self.exit_angle),
        ] {
            if !(0.0..=180.0).contains(&angle) {
                return Err(ConfigError::invalid(name, "must be within [0, 180] degrees"));
            }
        }
        if self.exit_angle <= self.entry_angle {
            return Err(ConfigError::invalid(
                "reps.exit_angle",
                "must be greater than reps.entry_angle",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// レポートのタイトルに使う種目名
    #[serde(default = "default_exercise")]
    pub exercise: String,
    /// 想定フレームレート
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// 記録開始前のカウントダウン（秒）
    #[serde(default = "default_warmup_seconds")]
    pub warmup_seconds: u32,
    /// 目標レップ数
    #[serde(default = "default_target_reps")]
    pub target_reps: u32,
}

fn default_exercise() -> String { "Lunges".to_string() }
fn default_fps() -> u32 { 30 }
fn default_warmup_seconds() -> u32 { 3 }
fn default_target_reps() -> u32 { 8 }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            exercise: default_exercise(),
            fps: default_fps(),
            warmup_seconds: default_warmup_seconds(),
            target_reps: default_target_reps(),
        }
    }
}

impl SessionConfig {
    pub fn warmup_frames(&self) -> u64 {
        u64::from(self.warmup_seconds) * u64::from(self.fps)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_listen_addr() -> String { "0.0.0.0:9100".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// ファイルが無ければデフォルト設定を返す。壊れたファイルはエラー。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Checks every tunable before the first frame is processed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        for (metric, range) in [
            ("front_knee_angle", t.front_knee_angle),
            ("back_knee_angle", t.back_knee_angle),
            ("torso_angle", t.torso_angle),
            ("hip_level", t.hip_level),
            ("stance_width", t.stance_width),
        ] {
            check_range(metric, range)?;
        }

        let a = &self.analysis;
        if !(0.0..=1.0).contains(&a.visibility_threshold) {
            return Err(ConfigError::invalid(
                "analysis.visibility_threshold",
                "must be within [0, 1]",
            ));
        }
        if a.max_errors == 0 {
            return Err(ConfigError::invalid("analysis.max_errors", "must be at least 1"));
        }

        self.reps.validate()?;

        if self.session.fps == 0 {
            return Err(ConfigError::invalid("session.fps", "must be positive"));
        }

        Ok(())
    }
}

fn check_range(metric: &'static str, range: Range) -> Result<(), ConfigError> {
    if !range.min.is_finite() || !range.max.is_finite() || range.min > range.max {
        return Err(ConfigError::InvalidRange {
            metric,
            min: range.min,
            max: range.max,
        });
    }
    Ok(())
}
