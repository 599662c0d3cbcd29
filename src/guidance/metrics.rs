//! Framing metrics computed straight from the raw (image-relative) skeleton.

use std::fmt;

use serde::Serialize;

use crate::pose::{KeypointIndex, Pose};

/// 身長がビューポート高さのこの割合を超えると近すぎ
pub const TOO_CLOSE_RATIO: f32 = 0.40;
/// 身長がビューポート高さのこの割合を下回ると遠すぎ
pub const TOO_FAR_RATIO: f32 = 0.15;

/// 表示領域のピクセルサイズ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceHint {
    TooClose,
    Good,
    TooFar,
}

impl fmt::Display for DistanceHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TooClose => "too-close",
            Self::Good => "good",
            Self::TooFar => "too-far",
        };
        f.write_str(s)
    }
}

/// 腰中点の水平位置を [-1, 1] に正規化したもの
///
/// 正: 被写体が画面中央より右（「左へ」と案内する側）
pub fn center_offset(pose: &Pose, viewport: Viewport) -> f32 {
    if viewport.width == 0 {
        return 0.0;
    }
    let (hip_x, _) = pose.hip_center();
    let width = viewport.width as f32;
    let half = width / 2.0;
    let px = hip_x * width;
    ((px - half) / half).clamp(-1.0, 1.0)
}

/// 鼻〜足首中点の距離をビューポート高さで判定
pub fn distance_hint(
    pose: &Pose,
    viewport: Viewport,
    too_close_ratio: f32,
    too_far_ratio: f32,
) -> DistanceHint {
    let viewport_height = viewport.height as f32;
    let body_px = pose.body_height() * viewport_height;
    classify_distance(body_px, viewport_height, too_close_ratio, too_far_ratio)
}

/// ピクセル身長を3段階に分類する。境界値ちょうどは Good
pub fn classify_distance(
    body_px: f32,
    viewport_height: f32,
    too_close_ratio: f32,
    too_far_ratio: f32,
) -> DistanceHint {
    if body_px > viewport_height * too_close_ratio {
        DistanceHint::TooClose
    } else if body_px < viewport_height * too_far_ratio {
        DistanceHint::TooFar
    } else {
        DistanceHint::Good
    }
}

/// 肩ラインの水平からの傾き（度、0〜90、向きなし）
pub fn tilt_degrees(pose: &Pose) -> f32 {
    let left = pose.get(KeypointIndex::LeftShoulder);
    let right = pose.get(KeypointIndex::RightShoulder);
    let dx = (right.x - left.x).abs();
    let dy = (right.y - left.y).abs();
    f32::atan2(dy, dx).to_degrees()
}
