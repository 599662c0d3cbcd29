//! Scripted collaborators for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::RgbImage;

use crate::pose::{Pose, PoseDetector};
use crate::source::FrameSource;
use crate::template::builtin::{figure_pose, STANDING};
use crate::template::TemplateAssets;

/// 正面向きの立ち姿勢。鼻が top_y、足首中点が top_y + height
pub fn standing_pose(center_x: f32, top_y: f32, height: f32) -> Pose {
    figure_pose(&STANDING, center_x, top_y, height)
}

pub struct VideoStep {
    delay: Duration,
    result: Option<Pose>,
}

#[derive(Default)]
pub struct MockDetector {
    pub init_error: Option<String>,
    pub init_delay: Duration,
    pub image_pose: Option<Pose>,
    pub image_delay: Duration,
    pub video_script: Mutex<VecDeque<VideoStep>>,
    pub video_fallback: Mutex<Option<Pose>>,
    pub timestamps: Mutex<Vec<u64>>,
    pub init_calls: AtomicUsize,
    pub video_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
    pub image_in_flight: AtomicUsize,
    pub max_image_in_flight: AtomicUsize,
}

impl MockDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 映像・静止画ともに同じ姿勢を返す
    pub fn with_pose(pose: Pose) -> Self {
        let detector = Self {
            image_pose: Some(pose.clone()),
            ..Self::default()
        };
        detector.set_video_fallback(Some(pose));
        detector
    }

    pub fn push_video(&self, delay: Duration, result: Option<Pose>) {
        self.video_script
            .lock()
            .unwrap()
            .push_back(VideoStep { delay, result });
    }

    /// スクリプトが尽きた後に返す結果
    pub fn set_video_fallback(&self, result: Option<Pose>) {
        *self.video_fallback.lock().unwrap() = result;
    }

    pub fn video_calls(&self) -> usize {
        self.video_calls.load(Ordering::SeqCst)
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn timestamps(&self) -> Vec<u64> {
        self.timestamps.lock().unwrap().clone()
    }
}

#[async_trait]
impl PoseDetector for MockDetector {
    async fn initialize(&self) -> Result<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.init_delay).await;
        match &self.init_error {
            Some(msg) => Err(anyhow!("{}", msg)),
            None => Ok(()),
        }
    }

    async fn detect_video(&self, _frame: &RgbImage, timestamp_ms: u64) -> Result<Option<Pose>> {
        self.video_calls.fetch_add(1, Ordering::SeqCst);
        self.timestamps.lock().unwrap().push(timestamp_ms);
        let step = self.video_script.lock().unwrap().pop_front();
        match step {
            Some(step) => {
                tokio::time::sleep(step.delay).await;
                Ok(step.result)
            }
            None => Ok(self.video_fallback.lock().unwrap().clone()),
        }
    }

    async fn detect_image(&self, _image: &RgbImage) -> Result<Option<Pose>> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.image_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_image_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        tokio::time::sleep(self.image_delay).await;
        self.image_in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.image_pose.clone())
    }
}

#[derive(Default)]
pub struct MockAssets {
    pub fail: bool,
    pub fetches: AtomicUsize,
}

impl MockAssets {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl TemplateAssets for MockAssets {
    async fn fetch(&self, locator: &str) -> Result<RgbImage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("no such asset: {}", locator));
        }
        Ok(RgbImage::new(4, 4))
    }
}

/// 常に同じフレームを返すソース
pub struct StaticFrames {
    frame: Option<Arc<RgbImage>>,
}

impl StaticFrames {
    pub fn blank() -> Self {
        Self {
            frame: Some(Arc::new(RgbImage::new(4, 4))),
        }
    }

    pub fn empty() -> Self {
        Self { frame: None }
    }
}

impl FrameSource for StaticFrames {
    fn current_frame(&self) -> Option<Arc<RgbImage>> {
        self.frame.clone()
    }
}
