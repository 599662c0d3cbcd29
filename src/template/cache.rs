use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::OnceCell;

use super::assets::TemplateAssets;
use super::{PoseTemplate, TemplateCatalog, TemplateId};
use crate::error::TemplateError;
use crate::pose::{normalize, NormalizedPose, PoseDetector};

/// テンプレートID → 正規化参照ポーズ のキャッシュ
///
/// 初回だけ参照画像に検出器をかける。同じIDの同時要求は同じ `OnceCell` を
/// 待つので検出は1回。失敗したIDはキャッシュしない。エントリは破棄しない。
pub struct TemplateCache {
    catalog: Arc<TemplateCatalog>,
    detector: Arc<dyn PoseDetector>,
    assets: Arc<dyn TemplateAssets>,
    timeout: Duration,
    entries: Mutex<HashMap<TemplateId, Arc<OnceCell<NormalizedPose>>>>,
}

impl TemplateCache {
    pub fn new(
        catalog: Arc<TemplateCatalog>,
        detector: Arc<dyn PoseDetector>,
        assets: Arc<dyn TemplateAssets>,
        timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            detector,
            assets,
            timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<TemplateCatalog> {
        &self.catalog
    }

    /// 解決済みなら参照ポーズを返す（検出器は呼ばない）
    pub fn cached(&self, id: &TemplateId) -> Option<NormalizedPose> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(id).and_then(|cell| cell.get().cloned())
    }

    pub async fn resolve(&self, id: &TemplateId) -> Result<NormalizedPose, TemplateError> {
        let template = self
            .catalog
            .get(id)
            .ok_or_else(|| TemplateError::UnknownTemplate(id.to_string()))?;
        let cell = self.entry(id);
        let pose = cell.get_or_try_init(|| self.compute(&template)).await?;
        Ok(pose.clone())
    }

    fn entry(&self, id: &TemplateId) -> Arc<OnceCell<NormalizedPose>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(entries.entry(id.clone()).or_default())
    }

    async fn compute(&self, template: &PoseTemplate) -> Result<NormalizedPose, TemplateError> {
        let Some(locator) = template.image.as_deref() else {
            return Ok(template.default_pose.clone());
        };
        let id = template.id.to_string();

        let work = async {
            let image = self
                .assets
                .fetch(locator)
                .await
                .map_err(|e| TemplateError::ImageLoad {
                    id: id.clone(),
                    reason: format!("{:#}", e),
                })?;
            let pose = self
                .detector
                .detect_image(&image)
                .await
                .map_err(|e| TemplateError::Detector {
                    id: id.clone(),
                    reason: format!("{:#}", e),
                })?
                .ok_or_else(|| TemplateError::NoPerson(id.clone()))?;
            Ok::<_, TemplateError>(normalize(&pose))
        };

        let pose = tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| TemplateError::Timeout(id.clone()))??;
        log::info!("template {} resolved from {}", id, locator);
        Ok(pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::builtin::{figure_pose, WAVE};
    use crate::testing::{MockAssets, MockDetector};
    use std::sync::atomic::Ordering;

    fn cache_with(detector: Arc<MockDetector>, assets: Arc<MockAssets>) -> TemplateCache {
        TemplateCache::new(
            Arc::new(TemplateCatalog::builtin()),
            detector,
            assets,
            Duration::from_secs(5),
        )
    }

    fn wave_detector(delay: Duration) -> Arc<MockDetector> {
        Arc::new(MockDetector {
            image_pose: Some(figure_pose(&WAVE, 0.4, 0.2, 0.6)),
            image_delay: delay,
            ..MockDetector::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_resolve_detects_once() {
        let detector = wave_detector(Duration::from_millis(200));
        let cache = cache_with(detector.clone(), Arc::new(MockAssets::default()));
        let id = TemplateId::from("wave");

        let (a, b) = tokio::join!(cache.resolve(&id), cache.resolve(&id));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(detector.image_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_selection_is_cached() {
        let detector = wave_detector(Duration::ZERO);
        let assets = Arc::new(MockAssets::default());
        let cache = cache_with(detector.clone(), assets.clone());
        let id = TemplateId::from("wave");

        assert!(cache.cached(&id).is_none());
        let first = cache.resolve(&id).await.unwrap();
        let second = cache.resolve(&id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.cached(&id), Some(first));
        assert_eq!(detector.image_calls(), 1);
        assert_eq!(assets.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolved_pose_comes_from_reference_image() {
        let detector = wave_detector(Duration::ZERO);
        let cache = cache_with(detector, Arc::new(MockAssets::default()));
        let pose = cache.resolve(&"wave".into()).await.unwrap();
        assert_eq!(pose, normalize(&figure_pose(&WAVE, 0.4, 0.2, 0.6)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_load_failure_not_cached() {
        let detector = wave_detector(Duration::ZERO);
        let assets = Arc::new(MockAssets::failing());
        let cache = cache_with(detector.clone(), assets.clone());
        let id = TemplateId::from("wave");

        let err = cache.resolve(&id).await.unwrap_err();
        assert!(matches!(err, TemplateError::ImageLoad { .. }));
        assert!(cache.cached(&id).is_none());

        // 失敗後は再試行できる
        let _ = cache.resolve(&id).await;
        assert_eq!(assets.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(detector.image_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_person_in_reference() {
        let detector = Arc::new(MockDetector::default());
        let cache = cache_with(detector, Arc::new(MockAssets::default()));
        let err = cache.resolve(&"standing".into()).await.unwrap_err();
        assert_eq!(err, TemplateError::NoPerson("standing".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolution_timeout() {
        let detector = wave_detector(Duration::from_secs(60));
        let cache = cache_with(detector, Arc::new(MockAssets::default()));
        let err = cache.resolve(&"wave".into()).await.unwrap_err();
        assert_eq!(err, TemplateError::Timeout("wave".to_string()));
        assert!(cache.cached(&"wave".into()).is_none());
    }

    #[tokio::test]
    async fn test_unknown_template() {
        let cache = cache_with(Arc::new(MockDetector::default()), Arc::new(MockAssets::default()));
        let err = cache.resolve(&"nope".into()).await.unwrap_err();
        assert_eq!(err, TemplateError::UnknownTemplate("nope".to_string()));
    }

    #[tokio::test]
    async fn test_template_without_image_uses_default_pose() {
        let mut template = (*TemplateCatalog::builtin().get(&"standing".into()).unwrap()).clone();
        template.image = None;
        let expected = template.default_pose.clone();
        let detector = Arc::new(MockDetector::default());
        let cache = TemplateCache::new(
            Arc::new(TemplateCatalog::new(vec![template])),
            detector.clone(),
            Arc::new(MockAssets::default()),
            Duration::from_secs(5),
        );
        assert_eq!(cache.resolve(&"standing".into()).await.unwrap(), expected);
        assert_eq!(detector.image_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_caches_do_not_share_entries() {
        let detector = wave_detector(Duration::ZERO);
        let first = cache_with(detector.clone(), Arc::new(MockAssets::default()));
        let second = cache_with(detector.clone(), Arc::new(MockAssets::default()));
        first.resolve(&"wave".into()).await.unwrap();
        assert!(second.cached(&"wave".into()).is_none());
        second.resolve(&"wave".into()).await.unwrap();
        assert_eq!(detector.image_calls(), 2);
    }
}
