use anyhow::{Context, Result};
use serde::Deserialize;

use super::keypoint::{PoseFrame, RawLandmark};
use crate::error::FrameError;

/// 外部の姿勢推定器
///
/// `Ok(None)` means the detector ran and found nobody in the image.
pub trait PoseSource {
    type Image: ?Sized;

    fn detect(&mut self, image: &Self::Image) -> Result<Option<PoseFrame>>;
}

/// One line of a recorded landmark dump.
#[derive(Debug, Deserialize)]
struct ReplayRecord {
    frame_index: u64,
    #[serde(default)]
    landmarks: Option<Vec<RawLandmark>>,
}

/// 記録済みランドマーク (JSON Lines) を再生するソース
///
/// 1行 = 1フレーム: `{"frame_index": 0, "landmarks": [{"x":..,"y":..,"z":..,"visibility":..}, ...]}`
/// `landmarks` が null または欠落なら人物未検出。
#[derive(Debug, Default)]
pub struct LandmarkReplay {
    decoded: u64,
}

impl LandmarkReplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    /// Decodes one line without collapsing a partial landmark set into "no person".
    pub fn decode(&mut self, line: &str) -> Result<(u64, Option<Vec<RawLandmark>>)> {
        let record: ReplayRecord =
            serde_json::from_str(line).context("malformed landmark record")?;
        self.decoded += 1;
        Ok((record.frame_index, record.landmarks))
    }
}

impl PoseSource for LandmarkReplay {
    type Image = str;

    fn detect(&mut self, line: &str) -> Result<Option<PoseFrame>> {
        let (frame_index, landmarks) = self.decode(line)?;
        match landmarks {
            None => Ok(None),
            Some(landmarks) => match PoseFrame::from_landmarks(frame_index, &landmarks) {
                Ok(frame) => Ok(Some(frame)),
                Err(e @ FrameError::IncompleteLandmarks { .. }) => {
                    Err(anyhow::Error::new(e).context(format!("frame {}", frame_index)))
                }
                Err(FrameError::NoPersonDetected) => Ok(None),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Joint;

    fn full_record(frame_index: u64) -> String {
        let landmarks: Vec<String> = (0..33)
            .map(|i| format!(r#"{{"x":{},"y":0.5,"z":0.0,"visibility":0.95}}"#, i as f32 / 100.0))
            .collect();
        format!(r#"{{"frame_index":{},"landmarks":[{}]}}"#, frame_index, landmarks.join(","))
    }

    #[test]
    fn test_detect_full_record() {
        let mut replay = LandmarkReplay::new();
        let frame = replay.detect(&full_record(7)).unwrap().unwrap();
        assert_eq!(frame.frame_index, 7);
        assert!((frame.get(Joint::LeftHip).x - 0.23).abs() < 1e-6);
        assert_eq!(replay.decoded(), 1);
    }

    #[test]
    fn test_detect_no_person() {
        let mut replay = LandmarkReplay::new();
        assert!(replay.detect(r#"{"frame_index":1,"landmarks":null}"#).unwrap().is_none());
        assert!(replay.detect(r#"{"frame_index":2}"#).unwrap().is_none());
    }

    #[test]
    fn test_detect_truncated_record_is_error() {
        let mut replay = LandmarkReplay::new();
        let line = r#"{"frame_index":3,"landmarks":[{"x":0.1,"y":0.2,"visibility":0.9}]}"#;
        assert!(replay.detect(line).is_err());
        // decode は部分集合をそのまま返す
        let (index, landmarks) = replay.decode(line).unwrap();
        assert_eq!(index, 3);
        assert_eq!(landmarks.unwrap().len(), 1);
    }

    #[test]
    fn test_detect_malformed_json() {
        let mut replay = LandmarkReplay::new();
        assert!(replay.detect("not json").is_err());
        assert_eq!(replay.decoded(), 0);
    }
}
