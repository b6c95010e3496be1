use std::collections::VecDeque;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::RepConfig;
use crate::error::ConfigError;

/// 前膝角度の変化方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Unknown,
    /// 角度が減少中（沈み込み）
    Descending,
    /// 角度が増加中（立ち上がり）
    Ascending,
}

/// Emitted when a lunge cycle closes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum RepEvent {
    /// Deep enough; the rep counter advanced.
    Counted { reps: u32, depth: f32 },
    /// The cycle closed above the depth threshold.
    Shallow { depth: f32 },
}

/// 平滑化した前膝角度の微分でレップを数える状態機械
///
/// `Idle → InLunge`: 下降中かつ平滑化角度 < `entry_angle`
/// `InLunge → Idle`: 上昇中かつ平滑化角度 > `exit_angle` かつ上昇フェーズが `exit_debounce_frames` を超えた
pub struct RepCounter {
    config: RepConfig,
    history: VecDeque<f32>,
    direction: Direction,
    phase_frames: u32,
    in_lunge: bool,
    deepest_angle: f32,
    reps: u32,
    shallow_rep: bool,
    shallow_reps: u32,
}

impl RepCounter {
    /// Rejects a config whose window or history would break the counter.
    pub fn new(config: RepConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            history: VecDeque::with_capacity(config.history_size),
            config,
            direction: Direction::Unknown,
            phase_frames: 0,
            in_lunge: false,
            deepest_angle: 180.0,
            reps: 0,
            shallow_rep: false,
            shallow_reps: 0,
        })
    }

    /// Feeds one front-knee angle. Returns an event when a cycle completes.
    pub fn update(&mut self, knee_angle: f32) -> Option<RepEvent> {
        if self.history.len() == self.config.history_size {
            self.history.pop_front();
        }
        self.history.push_back(knee_angle);

        let window = self.config.smoothing_window;
        if self.history.len() < window {
            return None;
        }

        let recent = self.history.range(self.history.len() - window..);
        let smoothed = recent.sum::<f32>() / window as f32;
        let newest = self.history[self.history.len() - 1];
        let oldest = self.history[self.history.len() - window];
        let derivative = newest - oldest;

        let prev_direction = self.direction;
        if derivative < -self.config.hysteresis {
            self.direction = Direction::Descending;
        } else if derivative > self.config.hysteresis {
            self.direction = Direction::Ascending;
        }

        if self.direction != prev_direction {
            debug!(?prev_direction, direction = ?self.direction, smoothed, "direction changed");
            self.phase_frames = 0;
        } else {
            self.phase_frames += 1;
        }

        if self.direction == Direction::Descending
            && smoothed < self.config.entry_angle
            && !self.in_lunge
        {
            debug!(smoothed, "entered lunge");
            self.in_lunge = true;
            self.deepest_angle = 180.0;
            self.shallow_rep = false;
        }

        if self.in_lunge {
            self.deepest_angle = self.deepest_angle.min(smoothed);
        }

        if self.direction == Direction::Ascending
            && smoothed > self.config.exit_angle
            && self.in_lunge
            && self.phase_frames > self.config.exit_debounce_frames
        {
            self.in_lunge = false;
            let depth = self.deepest_angle;
            if depth < self.config.depth_angle {
                self.reps += 1;
                info!("Rep {} counted, depth: {:.1}°", self.reps, depth);
                return Some(RepEvent::Counted { reps: self.reps, depth });
            }
            self.shallow_rep = true;
            self.shallow_reps += 1;
            info!("Shallow rep detected, depth: {:.1}°", depth);
            return Some(RepEvent::Shallow { depth });
        }

        None
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.direction = Direction::Unknown;
        self.phase_frames = 0;
        self.in_lunge = false;
        self.deepest_angle = 180.0;
        self.reps = 0;
        self.shallow_rep = false;
        self.shallow_reps = 0;
    }

    pub fn reps(&self) -> u32 {
        self.reps
    }

    pub fn shallow_rep(&self) -> bool {
        self.shallow_rep
    }

    pub fn shallow_reps(&self) -> u32 {
        self.shallow_reps
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn in_lunge(&self) -> bool {
        self.in_lunge
    }

    /// 今回（または直前）のレップで観測した最小の平滑化角度
    pub fn deepest_angle(&self) -> f32 {
        self.deepest_angle
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}
