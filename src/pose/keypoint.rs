use serde::{Deserialize, Serialize};

/// 検出器が返す 17 キーポイントのインデックス (COCO / MoveNet 順)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointIndex {
    pub const COUNT: usize = 17;

    pub const ALL: [KeypointIndex; Self::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// 単一キーポイント
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Keypoint {
    /// 画像相対X座標 (0.0〜1.0)
    pub x: f32,
    /// 画像相対Y座標 (0.0〜1.0、下が正)
    pub y: f32,
    /// 奥行き（検出器が出す場合のみ）
    pub z: Option<f32>,
    /// 可視性・信頼度 (0.0〜1.0)
    pub visibility: Option<f32>,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z: None,
            visibility: Some(visibility),
        }
    }

    /// 可視性が閾値を超えているか。可視性が無いキーポイントは見えていない扱い
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility.is_some_and(|v| v > threshold)
    }

    pub fn distance(&self, other: &Keypoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self, other: &Keypoint) -> (f32, f32) {
        ((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// 17キーポイントからなる姿勢（1回の検出結果）
///
/// 検出器は常に全スロットを埋めて返すので、固定長配列で持つ。
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub keypoints: [Keypoint; KeypointIndex::COUNT],
}

impl Pose {
    pub fn new(keypoints: [Keypoint; KeypointIndex::COUNT]) -> Self {
        Self { keypoints }
    }

    /// インデックスでキーポイントを取得
    pub fn get(&self, index: KeypointIndex) -> &Keypoint {
        &self.keypoints[index as usize]
    }

    pub fn get_mut(&mut self, index: KeypointIndex) -> &mut Keypoint {
        &mut self.keypoints[index as usize]
    }

    /// 左右ヒップの中点
    pub fn hip_center(&self) -> (f32, f32) {
        self.get(KeypointIndex::LeftHip)
            .midpoint(self.get(KeypointIndex::RightHip))
    }

    /// 左右肩の中点
    pub fn shoulder_center(&self) -> (f32, f32) {
        self.get(KeypointIndex::LeftShoulder)
            .midpoint(self.get(KeypointIndex::RightShoulder))
    }

    /// 鼻から両足首の中点までの距離（身長の代用値）
    pub fn body_height(&self) -> f32 {
        let nose = self.get(KeypointIndex::Nose);
        let (ax, ay) = self
            .get(KeypointIndex::LeftAnkle)
            .midpoint(self.get(KeypointIndex::RightAnkle));
        ((nose.x - ax).powi(2) + (nose.y - ay).powi(2)).sqrt()
    }

    /// 肩中点から腰中点までの距離（胴体長）
    pub fn torso_length(&self) -> f32 {
        let (sx, sy) = self.shoulder_center();
        let (hx, hy) = self.hip_center();
        ((sx - hx).powi(2) + (sy - hy).powi(2)).sqrt()
    }

    /// 全キーポイントの平均可視性（可視性なしは0扱い）
    pub fn average_visibility(&self) -> f32 {
        let sum: f32 = self
            .keypoints
            .iter()
            .map(|k| k.visibility.unwrap_or(0.0))
            .sum();
        sum / KeypointIndex::COUNT as f32
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            keypoints: [Keypoint::default(); KeypointIndex::COUNT],
        }
    }
}
