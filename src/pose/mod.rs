pub mod detector;
pub mod keypoint;
pub mod normalize;
#[cfg(feature = "onnx")]
pub mod onnx;

pub use detector::PoseDetector;
pub use keypoint::{Keypoint, KeypointIndex, Pose};
pub use normalize::{normalize, reference_scale, NormalizedPose};
#[cfg(feature = "onnx")]
pub use onnx::MoveNetDetector;
