use crate::pose::{KeypointIndex, NormalizedPose};

/// 平均誤差がこの値（正規化単位）以上でスコア0
pub const MATCH_SENSITIVITY: f32 = 0.5;
/// ライブ側のキーポイントはこの可視性を超えたものだけ比較する
pub const MATCH_VISIBILITY_THRESHOLD: f32 = 0.5;

/// テンプレートとの一致度 (0.0〜1.0)
///
/// 見えていないキーポイントはスキップ（減点しない）。比較できる点が
/// 1つも無ければ 0。
pub fn pose_match(
    live: &NormalizedPose,
    template: &NormalizedPose,
    key_landmarks: &[KeypointIndex],
    sensitivity: f32,
    visibility_threshold: f32,
) -> f32 {
    let mut total = 0.0;
    let mut count = 0u32;

    for &idx in key_landmarks {
        let kp = live.get(idx);
        if !kp.is_visible(visibility_threshold) {
            continue;
        }
        total += kp.distance(template.get(idx));
        count += 1;
    }

    if count == 0 {
        return 0.0;
    }

    let error = total / count as f32;
    if sensitivity <= 0.0 {
        return if error == 0.0 { 1.0 } else { 0.0 };
    }
    (1.0 - error / sensitivity).clamp(0.0, 1.0)
}
