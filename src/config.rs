use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::guidance::{
    MATCH_SENSITIVITY, MATCH_VISIBILITY_THRESHOLD, TOO_CLOSE_RATIO, TOO_FAR_RATIO,
};
use crate::pose::KeypointIndex;
use crate::session::schedule::DeviceClass;

#[derive(Debug, Default, Deserialize, Clone)]
pub struct GuideConfig {
    #[serde(default)]
    pub guidance: GuidanceConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GuidanceConfig {
    /// 身長/ビューポート高さがこれを超えると近すぎ
    #[serde(default = "default_too_close_ratio")]
    pub too_close_ratio: f32,
    /// 身長/ビューポート高さがこれ未満で遠すぎ
    #[serde(default = "default_too_far_ratio")]
    pub too_far_ratio: f32,
    /// 一致スコアが0になる平均誤差（正規化単位）
    #[serde(default = "default_match_sensitivity")]
    pub match_sensitivity: f32,
    /// 一致判定に使うキーポイントの可視性しきい値
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f32,
    /// 中央判定の不感帯
    #[serde(default = "default_center_dead_zone")]
    pub center_dead_zone: f32,
    /// 肩の傾き許容（度）
    #[serde(default = "default_tilt_tolerance_deg")]
    pub tilt_tolerance_deg: f32,
    /// ポーズ一致とみなすスコア
    #[serde(default = "default_match_success")]
    pub match_success: f32,
}

fn default_too_close_ratio() -> f32 { TOO_CLOSE_RATIO }
fn default_too_far_ratio() -> f32 { TOO_FAR_RATIO }
fn default_match_sensitivity() -> f32 { MATCH_SENSITIVITY }
fn default_visibility_threshold() -> f32 { MATCH_VISIBILITY_THRESHOLD }
fn default_center_dead_zone() -> f32 { 0.1 }
fn default_tilt_tolerance_deg() -> f32 { 10.0 }
fn default_match_success() -> f32 { 0.8 }

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            too_close_ratio: default_too_close_ratio(),
            too_far_ratio: default_too_far_ratio(),
            match_sensitivity: default_match_sensitivity(),
            visibility_threshold: default_visibility_threshold(),
            center_dead_zone: default_center_dead_zone(),
            tilt_tolerance_deg: default_tilt_tolerance_deg(),
            match_success: default_match_success(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ScheduleConfig {
    /// "desktop" | "mobile"
    #[serde(default)]
    pub device_class: DeviceClass,
    /// 検出レートの上書き（fps）
    #[serde(default)]
    pub detection_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TemplatesConfig {
    /// テンプレート参照画像のディレクトリ
    #[serde(default = "default_asset_dir")]
    pub asset_dir: String,
    /// 参照画像の読み込み＋検出のタイムアウト
    #[serde(default = "default_resolve_timeout_ms")]
    pub resolve_timeout_ms: u64,
    /// 起動時に選択するテンプレート
    #[serde(default)]
    pub initial: Option<String>,
    #[serde(default)]
    pub custom: Vec<CustomTemplateConfig>,
}

fn default_asset_dir() -> String { "templates".to_string() }
fn default_resolve_timeout_ms() -> u64 { 5000 }

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            asset_dir: default_asset_dir(),
            resolve_timeout_ms: default_resolve_timeout_ms(),
            initial: None,
            custom: Vec::new(),
        }
    }
}

/// 設定ファイルで追加するテンプレート
#[derive(Debug, Deserialize, Clone)]
pub struct CustomTemplateConfig {
    pub id: String,
    pub label: String,
    /// asset_dir からの相対パス
    pub image: String,
    pub key_landmarks: Vec<KeypointIndex>,
}

impl GuideConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: GuideConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// 読めなければデフォルト設定
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{:#}; using default config", e);
                Self::default()
            }
        }
    }
}
