pub mod keypoint;
pub mod source;

pub use keypoint::{Joint, Keypoint, PoseFrame, RawLandmark};
pub use source::{LandmarkReplay, PoseSource};
