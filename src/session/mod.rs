pub mod schedule;
pub mod snapshot;
mod worker;

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::GuideConfig;
use crate::guidance::{GuidanceParams, Viewport};
use crate::pose::PoseDetector;
use crate::source::FrameSource;
use crate::template::{TemplateCache, TemplateCatalog, TemplateId};

pub use schedule::{detection_interval, DeviceClass, GenerationGuard, RateLimiter, Ticker};
pub use snapshot::{CaptureMetadata, GuideSnapshot, SessionState};

use worker::{Command, Resources, Worker};

struct ActiveSession {
    token: CancellationToken,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

/// カメラセッション単位のガイダンスループのハンドル
///
/// `activate` でワーカータスクを起動し、`deactivate` で停止・合流する。
/// 状態は `subscribe` した watch チャンネルで受け取る。
pub struct GuideSession {
    res: Resources,
    publisher: watch::Sender<GuideSnapshot>,
    viewport: Option<Viewport>,
    template: Option<TemplateId>,
    active: Option<ActiveSession>,
}

impl GuideSession {
    /// キャッシュは呼び出し側が所有して渡す（セッション間で共有するかは呼び出し側次第）
    pub fn new(
        config: &GuideConfig,
        detector: Arc<dyn PoseDetector>,
        frames: Arc<dyn FrameSource>,
        cache: Arc<TemplateCache>,
    ) -> Self {
        let (publisher, _) = watch::channel(GuideSnapshot::default());
        Self {
            res: Resources {
                detector,
                frames,
                cache,
                params: GuidanceParams::from_config(&config.guidance),
                interval: detection_interval(&config.schedule),
            },
            publisher,
            viewport: None,
            template: config.templates.initial.clone().map(TemplateId::from),
            active: None,
        }
    }

    /// idle → warming。すでに動いていれば何もしない
    pub fn activate(&mut self) {
        if self.active.is_some() {
            return;
        }
        let token = CancellationToken::new();
        let (commands, rx) = mpsc::unbounded_channel();
        let worker = Worker::new(
            self.res.clone(),
            token.clone(),
            rx,
            self.publisher.clone(),
            self.viewport,
        );
        let task = tokio::spawn(worker.run(self.template.clone()));
        info!("pose guidance activated");
        self.active = Some(ActiveSession {
            token,
            commands,
            task,
        });
    }

    /// → idle。ワーカーの終了まで待つので、戻った後に状態が更新されることはない
    pub async fn deactivate(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        active.token.cancel();
        if let Err(e) = active.task.await {
            warn!("guidance task ended abnormally: {}", e);
        }
        self.publisher.send_replace(GuideSnapshot::default());
        info!("pose guidance deactivated");
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn select_template(&mut self, id: impl Into<TemplateId>) {
        let id = id.into();
        self.template = Some(id.clone());
        self.send(Command::SelectTemplate(id));
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
        self.send(Command::SetViewport(viewport));
    }

    fn send(&self, command: Command) {
        if let Some(active) = &self.active {
            let _ = active.commands.send(command);
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<GuideSnapshot> {
        self.publisher.subscribe()
    }

    pub fn snapshot(&self) -> GuideSnapshot {
        self.publisher.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.publisher.borrow().state
    }

    /// 撮影時点のポーズ一致度
    pub fn capture_pose_match(&self) -> Option<f32> {
        self.publisher.borrow().guidance.map(|g| g.pose_match)
    }

    pub fn capture_metadata(&self) -> CaptureMetadata {
        CaptureMetadata::from_snapshot(&self.publisher.borrow())
    }

    pub fn templates(&self) -> &TemplateCatalog {
        self.res.cache.catalog()
    }

    pub fn params(&self) -> &GuidanceParams {
        &self.res.params
    }
}

impl Drop for GuideSession {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.token.cancel();
        }
    }
}
