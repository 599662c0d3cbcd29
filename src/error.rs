use thiserror::Error;

/// セッション全体に影響するエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuideError {
    /// 検出器の初期化失敗。再アクティベートするまでガイダンスは出ない
    #[error("pose detection unavailable: {0}")]
    DetectorUnavailable(String),
}

/// テンプレート参照ポーズの解決失敗。呼び出し側は既定ポーズで続行する
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
    #[error("failed to load reference image for {id}: {reason}")]
    ImageLoad { id: String, reason: String },
    #[error("no person found in reference image for {0}")]
    NoPerson(String),
    #[error("detector failed on reference image for {id}: {reason}")]
    Detector { id: String, reason: String },
    #[error("timed out resolving template {0}")]
    Timeout(String),
    #[error("template resolution cancelled")]
    Cancelled,
}
