use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokio::sync::OnceCell;

use super::detector::PoseDetector;
use super::keypoint::{Keypoint, KeypointIndex, Pose};

/// MoveNet用の入力サイズ
pub const MOVENET_INPUT_SIZE: u32 = 192;

/// 平均信頼度がこれ未満なら人物なしとみなす
/// (MoveNet singlepose は人がいなくても17点を返す)
const MIN_AVERAGE_CONFIDENCE: f32 = 0.2;

/// MoveNet (ONNX) を使用した姿勢検出器
pub struct MoveNetDetector {
    model_path: PathBuf,
    session: OnceCell<Arc<Mutex<Session>>>,
}

impl MoveNetDetector {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            session: OnceCell::new(),
        }
    }

    async fn run(&self, image: &RgbImage) -> Result<Option<Pose>> {
        let session = self
            .session
            .get()
            .cloned()
            .ok_or_else(|| anyhow!("detector not initialized"))?;
        let input = preprocess_for_movenet(image);

        let pose = tokio::task::spawn_blocking(move || -> Result<Pose> {
            let mut session = session
                .lock()
                .map_err(|_| anyhow!("ONNX session lock poisoned"))?;
            infer(&mut session, input)
        })
        .await??;

        if pose.average_visibility() < MIN_AVERAGE_CONFIDENCE {
            return Ok(None);
        }
        Ok(Some(pose))
    }
}

#[async_trait]
impl PoseDetector for MoveNetDetector {
    async fn initialize(&self) -> Result<()> {
        let path = self.model_path.clone();
        self.session
            .get_or_try_init(|| async move {
                let session = tokio::task::spawn_blocking(move || -> Result<Session> {
                    let session = Session::builder()?
                        .with_optimization_level(GraphOptimizationLevel::Level3)?
                        .commit_from_file(&path)
                        .with_context(|| format!("Failed to load ONNX model {}", path.display()))?;
                    Ok(session)
                })
                .await??;
                Ok::<_, anyhow::Error>(Arc::new(Mutex::new(session)))
            })
            .await?;
        Ok(())
    }

    async fn detect_video(&self, frame: &RgbImage, _timestamp_ms: u64) -> Result<Option<Pose>> {
        self.run(frame).await
    }

    async fn detect_image(&self, image: &RgbImage) -> Result<Option<Pose>> {
        self.run(image).await
    }
}

/// 前処理済みテンソルから姿勢を検出
///
/// 入力: [1, 192, 192, 3] の f32 テンソル
/// 出力: Pose (17キーポイント)
fn infer(session: &mut Session, input: Array4<f32>) -> Result<Pose> {
    let input_tensor = Tensor::from_array(input)?;
    let outputs = session
        .run(ort::inputs!["serving_default_input_0" => input_tensor])
        .context("Inference failed")?;

    // MoveNet の出力は [1, 1, 17, 3] (y, x, confidence)
    let output: ndarray::ArrayViewD<f32> = outputs["StatefulPartitionedCall_0"]
        .try_extract_array()
        .context("Failed to extract output tensor")?;

    let keypoints: [Keypoint; KeypointIndex::COUNT] = std::array::from_fn(|i| {
        let y = output[[0, 0, i, 0]];
        let x = output[[0, 0, i, 1]];
        let confidence = output[[0, 0, i, 2]];
        Keypoint::new(x, y, confidence)
    });

    Ok(Pose::new(keypoints))
}

/// RGB画像を MoveNet用の入力テンソルに変換
///
/// - 192x192 にリサイズ
/// - [1, 192, 192, 3] の f32 テンソル (0.0-255.0)
pub fn preprocess_for_movenet(image: &RgbImage) -> Array4<f32> {
    let size = MOVENET_INPUT_SIZE;
    let resized = imageops::resize(image, size, size, FilterType::Triangle);

    let mut tensor = Array4::<f32>::zeros((1, size as usize, size as usize, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, y as usize, x as usize, c]] = pixel[c] as f32;
        }
    }
    tensor
}
