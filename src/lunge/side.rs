use nalgebra::{Point2, Vector2};
use serde::Serialize;

use crate::error::FrameError;
use crate::geometry::{angle_at, midpoint, stance_width};
use crate::pose::{Joint, PoseFrame};

/// 前脚/後脚に正規化した1フレーム分の計測値
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CanonicalMeasurement {
    pub front_knee_angle: f32,
    pub back_knee_angle: f32,
    pub torso_angle: f32,
    pub stance_width: f32,
    pub hip_level_diff: f32,
    pub front_is_left: bool,
    pub knee_past_toe: bool,
}

/// Decides the leading leg per frame and emits side-independent measurements.
pub struct SideNormalizer {
    visibility_threshold: f32,
}

impl SideNormalizer {
    pub fn new(visibility_threshold: f32) -> Self {
        Self { visibility_threshold }
    }

    pub fn normalize(&self, frame: &PoseFrame) -> Result<CanonicalMeasurement, FrameError> {
        if let Some((joint, visibility)) = frame.first_invisible(self.visibility_threshold) {
            return Err(FrameError::IncompleteLandmarks { joint, visibility });
        }

        let p = |joint: Joint| frame.get(joint).point();
        let (l_hip, r_hip) = (p(Joint::LeftHip), p(Joint::RightHip));
        let (l_knee, r_knee) = (p(Joint::LeftKnee), p(Joint::RightKnee));
        let (l_ankle, r_ankle) = (p(Joint::LeftAnkle), p(Joint::RightAnkle));
        let (l_shoulder, r_shoulder) = (p(Joint::LeftShoulder), p(Joint::RightShoulder));

        let left_knee_angle = angle_at(l_hip, l_knee, l_ankle);
        let right_knee_angle = angle_at(r_hip, r_knee, r_ankle);

        // より曲がっている脚が前脚。同値なら右
        let front_is_left = left_knee_angle < right_knee_angle;
        let (front_knee_angle, back_knee_angle) = if front_is_left {
            (left_knee_angle, right_knee_angle)
        } else {
            (right_knee_angle, left_knee_angle)
        };

        // 画像のx軸は右向きなので、左右で比較方向が逆になる
        let knee_past_toe = if front_is_left {
            l_knee.x < l_ankle.x
        } else {
            r_knee.x > r_ankle.x
        };

        let mid_hip = midpoint(l_hip, r_hip);
        let mid_shoulder = midpoint(l_shoulder, r_shoulder);
        let vertical_ref: Point2<f32> = mid_hip + Vector2::new(0.0, 1.0);
        let torso_angle = angle_at(vertical_ref, mid_hip, mid_shoulder);

        Ok(CanonicalMeasurement {
            front_knee_angle,
            back_knee_angle,
            torso_angle,
            stance_width: stance_width(l_ankle, r_ankle),
            hip_level_diff: (l_hip.y - r_hip.y).abs(),
            front_is_left,
            knee_past_toe,
        })
    }
}
