pub mod matcher;
pub mod metrics;

use std::fmt;

use serde::Serialize;

use crate::config::GuidanceConfig;
use crate::pose::{normalize, KeypointIndex, NormalizedPose, Pose};

pub use matcher::{pose_match, MATCH_SENSITIVITY, MATCH_VISIBILITY_THRESHOLD};
pub use metrics::{
    center_offset, classify_distance, distance_hint, tilt_degrees, DistanceHint, Viewport,
    TOO_CLOSE_RATIO, TOO_FAR_RATIO,
};

/// ガイダンス計算のしきい値一式
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuidanceParams {
    pub too_close_ratio: f32,
    pub too_far_ratio: f32,
    pub match_sensitivity: f32,
    pub visibility_threshold: f32,
    /// |offset| がこれ以下なら中央とみなす
    pub center_dead_zone: f32,
    /// これを超える肩の傾き（度）で水平にするよう案内
    pub tilt_tolerance_deg: f32,
    /// 一致度がこれ以上でポーズ一致
    pub match_success: f32,
}

impl GuidanceParams {
    pub fn from_config(config: &GuidanceConfig) -> Self {
        Self {
            too_close_ratio: config.too_close_ratio,
            too_far_ratio: config.too_far_ratio,
            match_sensitivity: config.match_sensitivity,
            visibility_threshold: config.visibility_threshold,
            center_dead_zone: config.center_dead_zone,
            tilt_tolerance_deg: config.tilt_tolerance_deg,
            match_success: config.match_success,
        }
    }
}

impl Default for GuidanceParams {
    fn default() -> Self {
        Self::from_config(&GuidanceConfig::default())
    }
}

/// 1フレーム分のフレーミング指示
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Guidance {
    /// -1〜1、正は被写体が右寄り
    pub center_offset: f32,
    pub distance: DistanceHint,
    /// 肩の傾き（度、0〜90）
    pub tilt: f32,
    /// テンプレート一致度 0〜1
    pub pose_match: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    MoveLeft,
    MoveRight,
    Centered,
}

/// 利用者に見せる案内
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FramingHint {
    Move(Direction),
    StepBack,
    StepCloser,
    LevelShoulders { tilt: f32 },
    PoseMatched { score: f32 },
}

impl fmt::Display for FramingHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move(Direction::MoveLeft) => write!(f, "Move left"),
            Self::Move(Direction::MoveRight) => write!(f, "Move right"),
            Self::Move(Direction::Centered) => write!(f, "Centered"),
            Self::StepBack => write!(f, "Step back"),
            Self::StepCloser => write!(f, "Step closer"),
            Self::LevelShoulders { tilt } => write!(f, "Level your shoulders ({:.0}°)", tilt),
            Self::PoseMatched { score } => write!(f, "Pose matched ({:.0}%)", score * 100.0),
        }
    }
}

impl Guidance {
    /// 中央に戻すための移動方向
    pub fn direction(&self, dead_zone: f32) -> Direction {
        if self.center_offset > dead_zone {
            Direction::MoveLeft
        } else if self.center_offset < -dead_zone {
            Direction::MoveRight
        } else {
            Direction::Centered
        }
    }

    pub fn hints(&self, params: &GuidanceParams) -> Vec<FramingHint> {
        let mut hints = vec![FramingHint::Move(self.direction(params.center_dead_zone))];
        match self.distance {
            DistanceHint::TooClose => hints.push(FramingHint::StepBack),
            DistanceHint::TooFar => hints.push(FramingHint::StepCloser),
            DistanceHint::Good => {}
        }
        if self.tilt > params.tilt_tolerance_deg {
            hints.push(FramingHint::LevelShoulders { tilt: self.tilt });
        }
        if self.pose_match >= params.match_success {
            hints.push(FramingHint::PoseMatched { score: self.pose_match });
        }
        hints
    }
}

/// 生スケルトン・テンプレート・ビューポートからガイダンスを組み立てる
///
/// ビューポートが空なら None。
pub fn compute_guidance(
    skeleton: &Pose,
    reference: &NormalizedPose,
    key_landmarks: &[KeypointIndex],
    viewport: Viewport,
    params: &GuidanceParams,
) -> Option<Guidance> {
    if viewport.is_empty() {
        return None;
    }
    let live = normalize(skeleton);
    Some(Guidance {
        center_offset: center_offset(skeleton, viewport),
        distance: distance_hint(skeleton, viewport, params.too_close_ratio, params.too_far_ratio),
        tilt: tilt_degrees(skeleton),
        pose_match: pose_match(
            &live,
            reference,
            key_landmarks,
            params.match_sensitivity,
            params.visibility_threshold,
        ),
    })
}
