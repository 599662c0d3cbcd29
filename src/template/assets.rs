use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::RgbImage;

/// テンプレート参照画像の取得元
#[async_trait]
pub trait TemplateAssets: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<RgbImage>;
}

/// ディレクトリ以下の画像ファイルを読む
pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, locator: &str) -> PathBuf {
        self.root.join(locator)
    }
}

#[async_trait]
impl TemplateAssets for DirectoryAssets {
    async fn fetch(&self, locator: &str) -> Result<RgbImage> {
        let path = self.path_for(locator);
        let image = tokio::task::spawn_blocking(move || {
            image::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))
                .map(|img| img.to_rgb8())
        })
        .await??;
        Ok(image)
    }
}
