//! Built-in pose templates and their default reference skeletons.
//!
//! Figures are given in body units: nose at (0, 0), ankle midpoint at (0, 1),
//! x growing toward the image right. The subject faces the camera, so the
//! left side of the body lands on the image right.

use crate::pose::{Keypoint, KeypointIndex, Pose};

use KeypointIndex::*;

pub type Figure = [(f32, f32); KeypointIndex::COUNT];

pub const STANDING: Figure = [
    (0.0, 0.0),     // Nose
    (0.02, -0.02),  // LeftEye
    (-0.02, -0.02), // RightEye
    (0.05, -0.01),  // LeftEar
    (-0.05, -0.01), // RightEar
    (0.12, 0.12),   // LeftShoulder
    (-0.12, 0.12),  // RightShoulder
    (0.15, 0.30),   // LeftElbow
    (-0.15, 0.30),  // RightElbow
    (0.16, 0.46),   // LeftWrist
    (-0.16, 0.46),  // RightWrist
    (0.08, 0.50),   // LeftHip
    (-0.08, 0.50),  // RightHip
    (0.08, 0.75),   // LeftKnee
    (-0.08, 0.75),  // RightKnee
    (0.08, 1.0),    // LeftAnkle
    (-0.08, 1.0),   // RightAnkle
];

pub const HANDS_ON_HIPS: Figure = with_arms(STANDING, (0.24, 0.32), (0.10, 0.48));

pub const ARMS_CROSSED: Figure = {
    let mut f = with_arms(STANDING, (0.13, 0.32), (0.0, 0.0));
    // 手首は反対側の肘の上
    f[LeftWrist as usize] = (-0.08, 0.30);
    f[RightWrist as usize] = (0.08, 0.30);
    f
};

pub const WAVE: Figure = {
    let mut f = STANDING;
    f[LeftElbow as usize] = (0.24, 0.05);
    f[LeftWrist as usize] = (0.28, -0.15);
    f
};

/// 左右対称に腕を置き換える
const fn with_arms(base: Figure, elbow: (f32, f32), wrist: (f32, f32)) -> Figure {
    let mut f = base;
    f[LeftElbow as usize] = elbow;
    f[RightElbow as usize] = (-elbow.0, elbow.1);
    f[LeftWrist as usize] = wrist;
    f[RightWrist as usize] = (-wrist.0, wrist.1);
    f
}

pub const ARMS_AND_TORSO: &[KeypointIndex] = &[
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
];

pub const FULL_BODY: &[KeypointIndex] = &[
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
];

pub const ARMS_ONLY: &[KeypointIndex] = &[
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
];

/// (id, label, figure, key landmarks)
pub const BUILTIN: &[(&str, &str, &Figure, &[KeypointIndex])] = &[
    ("standing", "Standing", &STANDING, FULL_BODY),
    ("hands_on_hips", "Hands on hips", &HANDS_ON_HIPS, ARMS_AND_TORSO),
    ("arms_crossed", "Arms crossed", &ARMS_CROSSED, ARMS_ONLY),
    ("wave", "Wave", &WAVE, ARMS_AND_TORSO),
];

/// 画像相対座標のスケルトンに展開する
pub fn figure_pose(figure: &Figure, center_x: f32, top_y: f32, height: f32) -> Pose {
    Pose::new(std::array::from_fn(|i| {
        let (dx, dy) = figure[i];
        Keypoint::new(center_x + dx * height, top_y + dy * height, 1.0)
    }))
}
