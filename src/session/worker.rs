//! The guidance loop: one task per activation, steps serialized in a select loop.

use std::sync::Arc;
use std::time::Duration;

use futures::future::OptionFuture;
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::schedule::{GenerationGuard, Ticker};
use super::snapshot::{GuideSnapshot, SessionState};
use crate::error::{GuideError, TemplateError};
use crate::guidance::{compute_guidance, Guidance, GuidanceParams, Viewport};
use crate::pose::{NormalizedPose, Pose, PoseDetector};
use crate::source::FrameSource;
use crate::template::{ActiveTemplate, PoseTemplate, TemplateCache, TemplateId};

#[derive(Debug)]
pub(crate) enum Command {
    SelectTemplate(TemplateId),
    SetViewport(Viewport),
}

/// ワーカーが使う外部リソース
#[derive(Clone)]
pub(crate) struct Resources {
    pub detector: Arc<dyn PoseDetector>,
    pub frames: Arc<dyn FrameSource>,
    pub cache: Arc<TemplateCache>,
    pub params: GuidanceParams,
    pub interval: Duration,
}

struct PendingResolve {
    template: Arc<PoseTemplate>,
    handle: JoinHandle<Result<NormalizedPose, TemplateError>>,
}

pub(crate) struct Worker {
    res: Resources,
    token: CancellationToken,
    commands: mpsc::UnboundedReceiver<Command>,
    publisher: watch::Sender<GuideSnapshot>,

    state: SessionState,
    error: Option<GuideError>,
    skeleton: Option<Pose>,
    person_present: bool,
    template: Option<ActiveTemplate>,
    viewport: Option<Viewport>,
    guidance: Option<Guidance>,

    generations: GenerationGuard,
    started: Instant,
    last_timestamp_ms: Option<u64>,
    pending: Option<PendingResolve>,
    /// 解決中に別テンプレートが選ばれたら保留（最後の要求だけ残す）
    deferred: Option<TemplateId>,
}

impl Worker {
    pub(crate) fn new(
        res: Resources,
        token: CancellationToken,
        commands: mpsc::UnboundedReceiver<Command>,
        publisher: watch::Sender<GuideSnapshot>,
        viewport: Option<Viewport>,
    ) -> Self {
        Self {
            res,
            token,
            commands,
            publisher,
            state: SessionState::Idle,
            error: None,
            skeleton: None,
            person_present: false,
            template: None,
            viewport,
            guidance: None,
            generations: GenerationGuard::default(),
            started: Instant::now(),
            last_timestamp_ms: None,
            pending: None,
            deferred: None,
        }
    }

    pub(crate) async fn run(mut self, initial_template: Option<TemplateId>) {
        self.set_state(SessionState::Warming);
        info!("pose detection warming up");

        let init = tokio::select! {
            _ = self.token.cancelled() => return,
            result = self.res.detector.initialize() => result,
        };
        if let Err(e) = init {
            error!("pose detector initialization failed: {:#}", e);
            self.error = Some(GuideError::DetectorUnavailable(format!("{:#}", e)));
            self.publish();
            // 再アクティベートされるまで warming のまま
            self.token.cancelled().await;
            return;
        }

        self.set_state(SessionState::Running);
        info!("pose detection running every {:?}", self.res.interval);

        if let Some(id) = initial_template {
            self.select_template(id);
        }

        let mut ticker = Ticker::start(self.res.interval);
        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                Some(command) = self.commands.recv() => self.handle_command(command),
                Some(result) = OptionFuture::from(self.pending.as_mut().map(|p| &mut p.handle)) => {
                    self.finish_resolve(result);
                }
                _ = ticker.tick() => self.detect().await,
            }
        }

        self.shutdown().await;
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SelectTemplate(id) => self.select_template(id),
            Command::SetViewport(viewport) => {
                if self.viewport != Some(viewport) {
                    self.viewport = Some(viewport);
                    self.recompute();
                }
            }
        }
    }

    async fn detect(&mut self) {
        let Some(frame) = self.res.frames.current_frame() else {
            debug!("no frame available");
            return;
        };
        let timestamp_ms = self.next_timestamp();
        let generation = self.generations.begin();

        let result = tokio::select! {
            _ = self.token.cancelled() => return,
            result = self.res.detector.detect_video(&frame, timestamp_ms) => result,
        };

        if !self.generations.commit(generation) {
            debug!("dropping stale detection #{}", generation);
            return;
        }

        match result {
            Ok(Some(pose)) => {
                self.skeleton = Some(pose);
                self.person_present = true;
                self.recompute();
            }
            Ok(None) => {
                // 最後のスケルトンは残す
                if self.person_present {
                    self.person_present = false;
                    self.publish();
                }
            }
            Err(e) => warn!("pose detection failed: {:#}", e),
        }
    }

    /// 映像モード用の単調増加タイムスタンプ
    fn next_timestamp(&mut self) -> u64 {
        let elapsed = self.started.elapsed().as_millis() as u64;
        let timestamp = match self.last_timestamp_ms {
            Some(last) if elapsed <= last => last + 1,
            _ => elapsed,
        };
        self.last_timestamp_ms = Some(timestamp);
        timestamp
    }

    fn select_template(&mut self, id: TemplateId) {
        if let Some(pending) = &self.pending {
            if pending.template.id == id {
                self.deferred = None;
            } else {
                debug!("deferring template {} until {} resolves", id, pending.template.id);
                self.deferred = Some(id);
            }
            return;
        }

        let Some(template) = self.res.cache.catalog().get(&id) else {
            warn!("unknown template {}", id);
            return;
        };

        if let Some(reference) = self.res.cache.cached(&id) {
            self.template = Some(ActiveTemplate::new(template, reference));
            self.recompute();
            return;
        }

        debug!("resolving template {}", id);
        let cache = Arc::clone(&self.res.cache);
        let token = self.token.child_token();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => Err(TemplateError::Cancelled),
                result = cache.resolve(&id) => result,
            }
        });
        self.pending = Some(PendingResolve { template, handle });
    }

    fn finish_resolve(&mut self, result: Result<Result<NormalizedPose, TemplateError>, JoinError>) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        let active = match result {
            Ok(Ok(reference)) => ActiveTemplate::new(pending.template, reference),
            Ok(Err(e)) => {
                warn!("{}; using built-in reference pose", e);
                ActiveTemplate::fallback(pending.template)
            }
            Err(e) => {
                warn!("template resolution task failed: {}; using built-in reference pose", e);
                ActiveTemplate::fallback(pending.template)
            }
        };
        self.template = Some(active);
        self.recompute();

        if let Some(next) = self.deferred.take() {
            self.select_template(next);
        }
    }

    /// 入力のどれかが欠けていればガイダンスなし
    fn recompute(&mut self) {
        self.guidance = match (&self.skeleton, &self.template, self.viewport) {
            (Some(skeleton), Some(template), Some(viewport)) => compute_guidance(
                skeleton,
                &template.reference,
                &template.template.key_landmarks,
                viewport,
                &self.res.params,
            ),
            _ => None,
        };
        self.publish();
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        let guidance = match self.state {
            SessionState::Running => self.guidance,
            _ => None,
        };
        self.publisher.send_replace(GuideSnapshot {
            state: self.state,
            skeleton: self.skeleton.clone(),
            person_present: self.person_present,
            guidance,
            template: self.template.as_ref().map(|t| t.id().clone()),
            error: self.error.clone(),
        });
    }

    async fn shutdown(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
            let _ = pending.handle.await;
        }
        debug!("guidance loop stopped");
    }
}
