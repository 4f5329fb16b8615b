// 该文件是 Cocoa Detect （可可苗检测） 项目的一部分。
// src/task.rs - 单次检测任务
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

use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  config::{AppConfig, DetectParams},
  input::{UploadError, UploadedImage},
  model::{Model, ModelLoader},
  output::{AnnotatedImage, DetectionSummary, OutputError, draw::Draw},
};

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("上传文件无效: {0}")]
  Upload(#[from] UploadError),
  #[error("图像解码失败: {0}")]
  Decode(#[from] image::ImageError),
  #[error("模型错误: {0}")]
  Model(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("输出错误: {0}")]
  Output(#[from] OutputError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

impl DetectError {
  fn model<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    DetectError::Model(Box::new(err))
  }
}

/// 加载模型、读取图像、推理并绘制结果
pub struct InferenceRunner<L> {
  loader: L,
  draw: Draw,
}

impl<L: ModelLoader> InferenceRunner<L> {
  pub fn new(loader: L, draw: Draw) -> Self {
    Self { loader, draw }
  }

  /// 每次调用都重新加载模型，只尝试一次
  pub fn detect(
    &self,
    model_path: &Path,
    image_path: &Path,
    params: &DetectParams,
  ) -> Result<AnnotatedImage, DetectError> {
    info!("开始任务...");
    let mut model = self
      .loader
      .load(model_path, params)
      .map_err(DetectError::model)?;

    let image = ImageReader::open(image_path)?
      .with_guessed_format()?
      .decode()?
      .to_rgb8();
    info!(
      "输入图像读取成功 ({}x{})，开始推理...",
      image.width(),
      image.height()
    );

    let now = std::time::Instant::now();
    let result = model.infer(&image).map_err(DetectError::model)?;
    info!(
      "推理完成，耗时: {:.2?}，检测到 {} 个目标",
      now.elapsed(),
      result.len()
    );

    Ok(self.draw.annotate(image, result))
  }
}

/// 编码后的检测结果
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
  pub png: Vec<u8>,
  pub summary: DetectionSummary,
}

/// 与界面无关的请求处理：上传字节进，标注图像出
pub struct DetectionService<L> {
  runner: InferenceRunner<L>,
  model_path: PathBuf,
  params: DetectParams,
  temp_dir: Option<PathBuf>,
}

impl<L: ModelLoader> DetectionService<L> {
  pub fn new(runner: InferenceRunner<L>, model_path: PathBuf, params: DetectParams) -> Self {
    Self {
      runner,
      model_path,
      params,
      temp_dir: None,
    }
  }

  pub fn with_temp_dir(mut self, temp_dir: Option<PathBuf>) -> Self {
    self.temp_dir = temp_dir;
    self
  }

  pub fn from_config(config: &AppConfig, loader: L) -> Result<Self, OutputError> {
    let draw = match &config.font_path {
      Some(path) => Draw::with_font_file(path)?,
      None => Draw::default(),
    };
    Ok(
      Self::new(
        InferenceRunner::new(loader, draw),
        config.model_path.clone(),
        config.params,
      )
      .with_temp_dir(config.temp_dir.clone()),
    )
  }

  /// 校验上传、写临时文件、检测，最后删除临时文件（无论成功与否）
  pub fn process(&self, file_name: &str, bytes: &[u8]) -> Result<AnnotatedImage, DetectError> {
    let upload = UploadedImage::validate(file_name, bytes)?;
    info!(
      "收到上传图像: {} ({:?}, {} 字节)",
      upload.name(),
      upload.kind(),
      bytes.len()
    );

    let mut temp = upload.materialize(self.temp_dir.as_deref())?;
    let result = self.runner.detect(&self.model_path, temp.path(), &self.params);

    if let Err(e) = temp.remove() {
      warn!("删除临时文件失败 {}: {}", temp.path().display(), e);
    }

    result
  }

  pub fn handle_request(&self, file_name: &str, bytes: &[u8]) -> Result<DetectionOutcome, DetectError> {
    let annotated = self.process(file_name, bytes)?;
    let png = annotated.encode_png()?;
    Ok(DetectionOutcome {
      png,
      summary: annotated.summary(),
    })
  }
}
