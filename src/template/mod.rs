pub mod assets;
pub mod builtin;
pub mod cache;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::TemplatesConfig;
use crate::pose::{normalize, KeypointIndex, NormalizedPose};

pub use assets::{DirectoryAssets, TemplateAssets};
pub use cache::TemplateCache;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(String);

impl TemplateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TemplateId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TemplateId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// 利用者に合わせてもらう目標ポーズ
#[derive(Debug, Clone)]
pub struct PoseTemplate {
    pub id: TemplateId,
    pub label: String,
    /// 一致度の計算に使うキーポイント
    pub key_landmarks: Vec<KeypointIndex>,
    /// 参照画像のロケータ。None ならデフォルトポーズをそのまま使う
    pub image: Option<String>,
    /// 参照画像から解決できなかったときに使うポーズ
    pub default_pose: NormalizedPose,
}

/// 現在ガイダンスに使っているテンプレートと参照ポーズ
#[derive(Debug, Clone)]
pub struct ActiveTemplate {
    pub template: Arc<PoseTemplate>,
    pub reference: NormalizedPose,
}

impl ActiveTemplate {
    pub fn new(template: Arc<PoseTemplate>, reference: NormalizedPose) -> Self {
        Self { template, reference }
    }

    pub fn fallback(template: Arc<PoseTemplate>) -> Self {
        let reference = template.default_pose.clone();
        Self { template, reference }
    }

    pub fn id(&self) -> &TemplateId {
        &self.template.id
    }
}

/// セッションで選べるテンプレート一覧（起動後は不変）
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: Vec<Arc<PoseTemplate>>,
}

impl TemplateCatalog {
    pub fn new(templates: Vec<PoseTemplate>) -> Self {
        Self {
            templates: templates.into_iter().map(Arc::new).collect(),
        }
    }

    /// 組み込みテンプレート。参照画像は `<id>.jpg`
    pub fn builtin() -> Self {
        let templates = builtin::BUILTIN
            .iter()
            .map(|&(id, label, figure, keys)| PoseTemplate {
                id: TemplateId::from(id),
                label: label.to_string(),
                key_landmarks: keys.to_vec(),
                image: Some(format!("{}.jpg", id)),
                default_pose: normalize(&builtin::figure_pose(figure, 0.5, 0.1, 0.8)),
            })
            .collect();
        Self::new(templates)
    }

    /// 組み込み + 設定ファイルの custom。同じ id は後勝ち
    pub fn from_config(config: &TemplatesConfig) -> Self {
        let mut catalog = Self::builtin();
        let neutral = normalize(&builtin::figure_pose(&builtin::STANDING, 0.5, 0.1, 0.8));
        for custom in &config.custom {
            let template = PoseTemplate {
                id: TemplateId::new(custom.id.clone()),
                label: custom.label.clone(),
                key_landmarks: custom.key_landmarks.clone(),
                image: Some(custom.image.clone()),
                default_pose: neutral.clone(),
            };
            catalog.templates.retain(|t| t.id != template.id);
            catalog.templates.push(Arc::new(template));
        }
        catalog
    }

    pub fn get(&self, id: &TemplateId) -> Option<Arc<PoseTemplate>> {
        self.templates.iter().find(|t| &t.id == id).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<PoseTemplate>> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
