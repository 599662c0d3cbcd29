pub mod config;
pub mod error;
pub mod guidance;
pub mod pose;
pub mod session;
pub mod source;
pub mod template;

#[cfg(test)]
mod testing;

pub use config::GuideConfig;
pub use error::{GuideError, TemplateError};
pub use guidance::{Direction, DistanceHint, FramingHint, Guidance, GuidanceParams, Viewport};
pub use pose::{Keypoint, KeypointIndex, NormalizedPose, Pose, PoseDetector};
pub use session::{CaptureMetadata, GuideSession, GuideSnapshot, SessionState};
pub use source::{FrameSource, ImageSequence};
pub use template::{TemplateCache, TemplateCatalog, TemplateId};
