use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

use crate::config::ScheduleConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    #[default]
    Desktop,
    /// 処理能力の低い端末。検出レートを落とす
    Mobile,
}

impl DeviceClass {
    pub fn target_fps(self) -> u32 {
        match self {
            Self::Desktop => 30,
            Self::Mobile => 15,
        }
    }
}

/// 検出の最小間隔
pub fn detection_interval(config: &ScheduleConfig) -> Duration {
    let fps = config
        .detection_fps
        .unwrap_or_else(|| config.device_class.target_fps())
        .max(1);
    Duration::from_micros(1_000_000 / fps as u64)
}

/// 厳密な最小間隔レートリミッタ
///
/// 基準は実際に試行した時刻。間隔内の試行は捨てる（後回しにしない）。
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last_attempt: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_attempt: None,
        }
    }

    /// 次に試行してよい時刻。まだ一度も試行していなければ None
    pub fn next_allowed(&self) -> Option<Instant> {
        self.last_attempt.map(|last| last + self.min_interval)
    }

    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_attempt {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_attempt = Some(now);
        true
    }
}

/// 検出結果の世代管理
///
/// 開始順に世代番号を振り、適用済みより古い世代の結果は捨てる。
#[derive(Debug, Default)]
pub struct GenerationGuard {
    issued: u64,
    applied: u64,
}

impl GenerationGuard {
    pub fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// 適用してよければ true
    pub fn commit(&mut self, generation: u64) -> bool {
        if generation <= self.applied {
            return false;
        }
        self.applied = generation;
        true
    }
}

/// 検出の周期トリガ
///
/// 前回の試行から最小間隔が経つまで待つ。処理が遅れた回の分を
/// 取り戻そうとはしない（連続発火しない）。停止は drop。tick は cancel-safe。
pub struct Ticker {
    limiter: RateLimiter,
}

impl Ticker {
    pub fn start(period: Duration) -> Self {
        Self {
            limiter: RateLimiter::new(period),
        }
    }

    /// 試行してよくなったら、その時刻を返す
    pub async fn tick(&mut self) -> Instant {
        loop {
            if let Some(at) = self.limiter.next_allowed() {
                tokio::time::sleep_until(at).await;
            }
            let now = Instant::now();
            if self.limiter.try_acquire(now) {
                return now;
            }
            log::debug!("tick inside minimum interval, waiting");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_interval() {
        let mut config = ScheduleConfig::default();
        assert_eq!(detection_interval(&config), Duration::from_micros(33_333));

        config.device_class = DeviceClass::Mobile;
        assert_eq!(detection_interval(&config), Duration::from_micros(66_666));

        config.detection_fps = Some(10);
        assert_eq!(detection_interval(&config), Duration::from_millis(100));

        config.detection_fps = Some(0);
        assert_eq!(detection_interval(&config), Duration::from_secs(1));
    }

    #[test]
    fn test_rate_limiter_drops_burst() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(Duration::from_millis(100));

        assert!(limiter.try_acquire(start));
        assert!(!limiter.try_acquire(start + Duration::from_millis(10)));
        assert!(!limiter.try_acquire(start + Duration::from_millis(99)));
        assert!(limiter.try_acquire(start + Duration::from_millis(100)));
        // 捨てた試行は基準時刻を動かさない
        assert!(!limiter.try_acquire(start + Duration::from_millis(150)));
        assert!(limiter.try_acquire(start + Duration::from_millis(200)));
    }

    #[test]
    fn test_rate_limiter_next_allowed() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(Duration::from_secs(1));
        assert_eq!(limiter.next_allowed(), None);
        assert!(limiter.try_acquire(start));
        assert_eq!(limiter.next_allowed(), Some(start + Duration::from_secs(1)));
    }

    #[test]
    fn test_generation_guard_rejects_stale() {
        let mut guard = GenerationGuard::default();
        let first = guard.begin();
        let second = guard.begin();

        // 後発が先に完了
        assert!(guard.commit(second));
        assert!(!guard.commit(first));

        let third = guard.begin();
        assert!(guard.commit(third));
        assert!(!guard.commit(third));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_cadence() {
        let period = Duration::from_millis(50);
        let mut ticker = Ticker::start(period);
        let first = ticker.tick().await;
        let second = ticker.tick().await;
        let third = ticker.tick().await;
        for gap in [second - first, third - second] {
            assert!(gap >= period, "gap {:?}", gap);
            assert!(gap <= period + Duration::from_millis(1), "gap {:?}", gap);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_tick_keeps_minimum_gap() {
        let period = Duration::from_millis(50);
        let mut ticker = Ticker::start(period);
        // 最初の tick を遅れて取りに行く
        tokio::time::sleep(Duration::from_millis(40)).await;
        ticker.tick().await;
        let first = Instant::now();
        ticker.tick().await;
        let second = Instant::now();
        assert!(second - first >= period, "attempts {:?} apart", second - first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_step_does_not_bunch_ticks() {
        let period = Duration::from_millis(50);
        let mut ticker = Ticker::start(period);
        ticker.tick().await;
        // 検出が数周期ぶん掛かった
        tokio::time::sleep(Duration::from_millis(175)).await;
        let late = ticker.tick().await;
        assert_eq!(late, Instant::now());
        let next = ticker.tick().await;
        assert!(next - late >= period);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_tick_future_keeps_gap() {
        let period = Duration::from_millis(50);
        let mut ticker = Ticker::start(period);
        let first = ticker.tick().await;
        // select! で他の分岐が先に完了した状況
        tokio::select! {
            _ = ticker.tick() => panic!("tick fired early"),
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
        }
        let second = ticker.tick().await;
        assert!(second - first >= period);
    }
}
