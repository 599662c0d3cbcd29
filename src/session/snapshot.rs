use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::GuideError;
use crate::guidance::Guidance;
use crate::pose::Pose;
use crate::template::TemplateId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// 検出器もスケジュールも止まっている
    #[default]
    Idle,
    /// 検出器を初期化中（ガイダンスなし）
    Warming,
    /// 周期検出中
    Running,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Warming => "warming",
            Self::Running => "running",
        };
        f.write_str(s)
    }
}

/// 描画側に渡す1ステップ分の状態
#[derive(Debug, Clone, Default)]
pub struct GuideSnapshot {
    pub state: SessionState,
    /// 最後に検出できたスケルトン（人物を見失っても残る）
    pub skeleton: Option<Pose>,
    pub person_present: bool,
    pub guidance: Option<Guidance>,
    /// ガイダンスに使っているテンプレート
    pub template: Option<TemplateId>,
    pub error: Option<GuideError>,
}

impl GuideSnapshot {
    /// 人物が見えているときだけのガイダンス
    pub fn actionable_guidance(&self) -> Option<&Guidance> {
        if self.person_present {
            self.guidance.as_ref()
        } else {
            None
        }
    }
}

/// 撮影写真に添えるメタデータ
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureMetadata {
    pub pose_match: Option<f32>,
    pub template: Option<TemplateId>,
    pub captured_at_ms: u64,
}

impl CaptureMetadata {
    pub fn from_snapshot(snapshot: &GuideSnapshot) -> Self {
        let captured_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            pose_match: snapshot.guidance.map(|g| g.pose_match),
            template: snapshot.template.clone(),
            captured_at_ms,
        }
    }
}
