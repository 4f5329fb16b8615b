// 该文件是 Cocoa Detect （可可苗检测） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use cocoa_detect::{
  FromUrl,
  config::AppConfig,
  input::ImageFileInput,
  model::{WithLabel, YoloV8Loader},
  output::SaveImageFileOutput,
  task::DetectionService,
};

use args::Command;

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();
  let config = args.to_config()?;

  info!("模型文件路径: {}", config.model_path.display());
  info!("获取策略: {:?}", config.strategy);
  info!(
    "置信度阈值: {}，NMS 阈值: {}",
    config.params.confidence, config.params.iou
  );

  provision(&config)?;

  match args.command {
    Command::Provision => Ok(()),
    Command::Detect { input, output } => run_detect(&config, &input, &output),
    #[cfg(feature = "server")]
    Command::Serve { .. } => run_server(config),
  }
}

fn provision(config: &AppConfig) -> Result<()> {
  info!("正在获取模型...");
  config
    .artifact_source()?
    .provision(&config.model_path)
    .with_context(|| format!("无法获取模型文件: {}", config.model_path.display()))?;
  info!("模型文件就绪");
  Ok(())
}

fn run_detect(config: &AppConfig, input: &Url, output: &Url) -> Result<()> {
  let input = ImageFileInput::from_url(input)?;
  let output = SaveImageFileOutput::from_url(output)?;
  let service = DetectionService::from_config(config, YoloV8Loader::from_config(config))?;

  let bytes = input.read_bytes()?;
  let annotated = service.process(&input.file_name(), &bytes)?;

  for item in annotated.result.items.iter() {
    info!(
      "  - {}: {:.2}% at [{:.3}, {:.3}, {:.3}, {:.3}]",
      item.kind.to_label_str(),
      item.score * 100.0,
      item.bbox[0],
      item.bbox[1],
      item.bbox[2],
      item.bbox[3]
    );
  }

  output.save(&annotated)?;

  let summary = annotated.summary();
  info!(
    "{}: 可可苗 {} 个，种植穴 {} 个，共 {} 个",
    summary.caption, summary.plants, summary.holes, summary.total
  );
  println!("{}", serde_json::to_string_pretty(&summary)?);

  Ok(())
}

#[cfg(feature = "server")]
fn run_server(config: AppConfig) -> Result<()> {
  use std::sync::Arc;

  let service = Arc::new(DetectionService::from_config(
    &config,
    YoloV8Loader::from_config(&config),
  )?);

  tokio::runtime::Builder::new_multi_thread()
    .enable_all()
    .build()?
    .block_on(cocoa_detect::server::serve(service, &config))?;

  info!("服务已退出");
  Ok(())
}
