// 该文件是 Cocoa Detect （可可苗检测） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

use cocoa_detect::config::{
  AppConfig, ConfigError, DEFAULT_CONFIDENCE, DEFAULT_IOU, DEFAULT_MODEL_PATH, DetectParams,
  ProvisionStrategy,
};

/// Cocoa Detect 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型文件路径
  #[arg(long, env = "COCOA_MODEL_PATH", default_value = DEFAULT_MODEL_PATH, value_name = "FILE", global = true)]
  pub model: PathBuf,

  /// 模型下载地址（remote / cached 策略需要）
  #[arg(long, env = "COCOA_MODEL_URL", value_name = "URL", global = true)]
  pub model_url: Option<Url>,

  /// 模型获取策略
  #[arg(long, env = "COCOA_PROVISION", value_enum, default_value_t = ProvisionStrategy::Cached, global = true)]
  pub provision: ProvisionStrategy,

  /// 标签字体文件（TTF/OTF），不指定时只绘制色块
  #[arg(long, env = "COCOA_FONT", value_name = "FILE", global = true)]
  pub font: Option<PathBuf>,

  /// 临时文件目录，默认使用系统临时目录
  #[arg(long, env = "COCOA_TEMP_DIR", value_name = "DIR", global = true)]
  pub temp_dir: Option<PathBuf>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE, value_name = "THRESHOLD", global = true)]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_IOU, value_name = "THRESHOLD", global = true)]
  pub iou: f32,

  /// 模型输入尺寸，动态输入形状的模型需要指定
  #[arg(long, env = "COCOA_INPUT_SIZE", value_name = "PIXELS", global = true)]
  pub input_size: Option<u32>,

  /// ONNX Runtime 推理线程数
  #[arg(long, env = "COCOA_THREADS", value_name = "N", global = true)]
  pub threads: Option<usize>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 启动网页服务
  #[cfg(feature = "server")]
  Serve {
    /// 监听地址
    #[arg(long, env = "COCOA_LISTEN", default_value = "0.0.0.0:8501")]
    listen: std::net::SocketAddr,

    /// 上传大小上限（字节）
    #[arg(long, env = "COCOA_MAX_UPLOAD", default_value_t = cocoa_detect::config::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload: usize,
  },
  /// 对单张图像运行检测
  Detect {
    /// 输入图像，例如 image:///data/tile.tif
    #[arg(long, value_name = "SOURCE")]
    input: Url,

    /// 输出图像，例如 image:///data/tile-annotated.png
    #[arg(long, value_name = "OUTPUT")]
    output: Url,
  },
  /// 只获取模型文件
  Provision,
}

impl Args {
  pub fn to_config(&self) -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig {
      model_path: self.model.clone(),
      model_url: self.model_url.clone(),
      strategy: self.provision,
      params: DetectParams::new(self.confidence, self.iou)?,
      temp_dir: self.temp_dir.clone(),
      font_path: self.font.clone(),
      input_size: self.input_size,
      intra_threads: self.threads,
      ..AppConfig::default()
    };

    #[cfg(feature = "server")]
    if let Command::Serve { listen, max_upload } = &self.command {
      config.listen = *listen;
      config.max_upload_bytes = *max_upload;
    }

    Ok(config)
  }
}
