use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use pose_guide::pose::MoveNetDetector;
use pose_guide::template::DirectoryAssets;
use pose_guide::{
    GuideConfig, GuideSession, ImageSequence, SessionState, TemplateCache, TemplateCatalog,
    Viewport,
};

/// 画像列に対してガイダンスを流して表示する
#[derive(Parser, Debug)]
#[command(name = "guide_preview")]
struct Args {
    /// 設定ファイル
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// フレーム画像のディレクトリ
    #[arg(long)]
    frames: PathBuf,

    /// MoveNet モデル
    #[arg(long, default_value = "models/movenet_lightning.onnx")]
    model: PathBuf,

    /// 選択するテンプレートID
    #[arg(long)]
    template: Option<String>,

    #[arg(long, default_value_t = 720)]
    width: u32,

    #[arg(long, default_value_t = 1280)]
    height: u32,

    /// 実行時間（秒）
    #[arg(long, default_value_t = 10)]
    seconds: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = GuideConfig::load_or_default(&args.config);
    let catalog = Arc::new(TemplateCatalog::from_config(&config.templates));
    println!("Templates:");
    for template in catalog.iter() {
        println!("  {:<16} {}", template.id, template.label);
    }

    let detector = Arc::new(MoveNetDetector::new(&args.model));
    let frames = Arc::new(ImageSequence::load_dir(&args.frames)?);
    let assets = Arc::new(DirectoryAssets::new(&config.templates.asset_dir));
    let cache = Arc::new(TemplateCache::new(
        catalog,
        detector.clone(),
        assets,
        Duration::from_millis(config.templates.resolve_timeout_ms),
    ));

    let mut session = GuideSession::new(&config, detector, frames, cache);
    session.set_viewport(Viewport::new(args.width, args.height));
    if let Some(id) = args.template {
        session.select_template(id);
    }

    let mut rx = session.subscribe();
    session.activate();

    let deadline = tokio::time::sleep(Duration::from_secs(args.seconds));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                if let Some(err) = &snapshot.error {
                    eprintln!("{}", err);
                    continue;
                }
                if snapshot.state != SessionState::Running {
                    println!("[{}]", snapshot.state);
                    continue;
                }
                match snapshot.actionable_guidance() {
                    Some(guidance) => {
                        let hints: Vec<String> = guidance
                            .hints(session.params())
                            .iter()
                            .map(|h| h.to_string())
                            .collect();
                        println!(
                            "offset {:+.2} | {} | tilt {:.1}° | match {:.0}% | {}",
                            guidance.center_offset,
                            guidance.distance,
                            guidance.tilt,
                            guidance.pose_match * 100.0,
                            hints.join(", ")
                        );
                    }
                    None if !snapshot.person_present => println!("no person"),
                    None => {}
                }
            }
        }
    }

    let meta = session.capture_metadata();
    println!("Capture metadata: {:?}", meta);
    session.deactivate().await;
    Ok(())
}
