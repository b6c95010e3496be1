use std::fmt;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// ランジ判定に使う8キーポイント
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(usize)]
pub enum Joint {
    LeftShoulder = 0,
    RightShoulder = 1,
    LeftHip = 2,
    RightHip = 3,
    LeftKnee = 4,
    RightKnee = 5,
    LeftAnkle = 6,
    RightAnkle = 7,
}

impl Joint {
    pub const COUNT: usize = 8;

    pub const ALL: [Joint; Joint::COUNT] = [
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// BlazePose (33点) におけるインデックス
    pub fn landmark_index(self) -> usize {
        match self {
            Self::LeftShoulder => 11,
            Self::RightShoulder => 12,
            Self::LeftHip => 23,
            Self::RightHip => 24,
            Self::LeftKnee => 25,
            Self::RightKnee => 26,
            Self::LeftAnkle => 27,
            Self::RightAnkle => 28,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::LeftShoulder => "LEFT_SHOULDER",
            Self::RightShoulder => "RIGHT_SHOULDER",
            Self::LeftHip => "LEFT_HIP",
            Self::RightHip => "RIGHT_HIP",
            Self::LeftKnee => "LEFT_KNEE",
            Self::RightKnee => "RIGHT_KNEE",
            Self::LeftAnkle => "LEFT_ANKLE",
            Self::RightAnkle => "RIGHT_ANKLE",
        }
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 単一キーポイント
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint {
    /// 正規化されたX座標 (0.0〜1.0, 右が正)
    pub x: f32,
    /// 正規化されたY座標 (0.0〜1.0, 下が正)
    pub y: f32,
    /// 可視性スコア (0.0〜1.0)
    pub visibility: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self { x, y, visibility }
    }

    /// 可視性が閾値以上か
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility >= threshold
    }

    pub fn point(&self) -> Point2<f32> {
        Point2::new(self.x, self.y)
    }
}

/// One landmark exactly as the external pose model reports it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawLandmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    pub visibility: f32,
}

impl RawLandmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }
}

/// 1フレーム分の8キーポイント
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    pub frame_index: u64,
    pub joints: [Keypoint; Joint::COUNT],
}

impl PoseFrame {
    pub fn new(frame_index: u64, joints: [Keypoint; Joint::COUNT]) -> Self {
        Self { frame_index, joints }
    }

    /// Picks the eight lunge joints out of a full BlazePose landmark set.
    ///
    /// A landmark that is absent or has non-finite coordinates fails the frame
    /// with `IncompleteLandmarks`; visibility is judged later by the side normalizer.
    pub fn from_landmarks(frame_index: u64, landmarks: &[RawLandmark]) -> Result<Self, FrameError> {
        let mut joints = [Keypoint::default(); Joint::COUNT];
        for joint in Joint::ALL {
            let lm = landmarks
                .get(joint.landmark_index())
                .filter(|lm| lm.x.is_finite() && lm.y.is_finite() && lm.visibility.is_finite())
                .ok_or(FrameError::IncompleteLandmarks {
                    joint,
                    visibility: 0.0,
                })?;
            joints[joint as usize] = Keypoint::new(lm.x, lm.y, lm.visibility);
        }
        Ok(Self::new(frame_index, joints))
    }

    pub fn get(&self, joint: Joint) -> &Keypoint {
        &self.joints[joint as usize]
    }

    /// 閾値未満の最初のキーポイント
    ///
    /// NaN の可視性や非有限の座標も使えないものとして扱う。
    pub fn first_invisible(&self, threshold: f32) -> Option<(Joint, f32)> {
        Joint::ALL.iter().find_map(|&joint| {
            let kp = self.get(joint);
            let usable = kp.is_visible(threshold) && kp.x.is_finite() && kp.y.is_finite();
            (!usable).then_some((joint, kp.visibility))
        })
    }
}
