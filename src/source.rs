use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use image::RgbImage;

/// 検出に渡す最新フレームの供給元（カメラ等）
pub trait FrameSource: Send + Sync {
    /// 準備できていなければ None
    fn current_frame(&self) -> Option<Arc<RgbImage>>;
}

/// 画像列をループ再生するフレームソース（オフライン確認用）
pub struct ImageSequence {
    frames: Vec<Arc<RgbImage>>,
    cursor: AtomicUsize,
}

impl ImageSequence {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames: frames.into_iter().map(Arc::new).collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// ディレクトリ内の png/jpg をファイル名順に読み込む
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .with_context(|| format!("failed to read {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg")
                    })
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            bail!("no images in {}", dir.display());
        }

        let frames = paths
            .iter()
            .map(|path| {
                image::open(path)
                    .with_context(|| format!("failed to open {}", path.display()))
                    .map(|img| img.to_rgb8())
            })
            .collect::<Result<Vec<_>>>()?;
        log::info!("loaded {} frames from {}", frames.len(), dir.display());
        Ok(Self::new(frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for ImageSequence {
    fn current_frame(&self) -> Option<Arc<RgbImage>> {
        if self.frames.is_empty() {
            return None;
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.frames.len();
        Some(Arc::clone(&self.frames[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_sequence_loops() {
        let frames = vec![
            RgbImage::from_pixel(2, 2, Rgb([1, 0, 0])),
            RgbImage::from_pixel(2, 2, Rgb([2, 0, 0])),
        ];
        let seq = ImageSequence::new(frames);
        let reds: Vec<u8> = (0..5)
            .map(|_| seq.current_frame().unwrap().get_pixel(0, 0)[0])
            .collect();
        assert_eq!(reds, vec![1, 2, 1, 2, 1]);
    }

    #[test]
    fn test_empty_sequence() {
        let seq = ImageSequence::new(Vec::new());
        assert!(seq.is_empty());
        assert!(seq.current_frame().is_none());
    }

    #[test]
    fn test_load_dir_missing() {
        assert!(ImageSequence::load_dir("no/such/dir").is_err());
    }
}
