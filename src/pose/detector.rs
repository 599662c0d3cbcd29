use anyhow::Result;
use async_trait::async_trait;
use image::RgbImage;

use super::keypoint::Pose;

/// 外部の姿勢検出器
///
/// 映像フレーム用（単調増加するタイムスタンプ付き）と静止画用の2モードを持つ。
/// 人物がいなければ `Ok(None)`。
#[async_trait]
pub trait PoseDetector: Send + Sync {
    /// モデル読み込みなどの非同期初期化
    async fn initialize(&self) -> Result<()>;

    /// 映像フレームから検出
    async fn detect_video(&self, frame: &RgbImage, timestamp_ms: u64) -> Result<Option<Pose>>;

    /// 静止画から検出（テンプレート参照画像用）
    async fn detect_image(&self, image: &RgbImage) -> Result<Option<Pose>>;
}
