use super::keypoint::{Keypoint, KeypointIndex, Pose};

/// 腰中点を原点、身長を1とした座標系に変換済みの姿勢
///
/// 変換に使った中心とスケールは保持しない。
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPose {
    pub keypoints: [Keypoint; KeypointIndex::COUNT],
}

impl NormalizedPose {
    pub fn get(&self, index: KeypointIndex) -> &Keypoint {
        &self.keypoints[index as usize]
    }
}

/// 正規化に使う基準長
///
/// 鼻〜足首中点 → 肩中点〜腰中点 → 1.0 の順にフォールバックする。
pub fn reference_scale(pose: &Pose) -> f32 {
    let height = pose.body_height();
    if height > 0.0 {
        return height;
    }
    let torso = pose.torso_length();
    if torso > 0.0 {
        return torso;
    }
    1.0
}

/// 生の検出結果を位置・スケール不変な表現に変換する
///
/// - x, y: 腰中点を引いてから基準長で割る
/// - z: 基準長で割るだけ（平行移動しない）
/// - 可視性: そのまま
pub fn normalize(pose: &Pose) -> NormalizedPose {
    let (cx, cy) = pose.hip_center();
    let scale = reference_scale(pose);

    let keypoints = pose.keypoints.map(|kp| Keypoint {
        x: (kp.x - cx) / scale,
        y: (kp.y - cy) / scale,
        z: kp.z.map(|z| z / scale),
        visibility: kp.visibility,
    });

    NormalizedPose { keypoints }
}
