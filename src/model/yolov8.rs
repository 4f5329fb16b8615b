// 该文件是 Cocoa Detect （可可苗检测） 项目的一部分。
// src/model/yolov8.rs - YOLOv8 ONNX 模型
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

use image::RgbImage;
use ndarray::Array4;
use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::TensorRef,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  config::{AppConfig, DetectParams},
  frame::{Letterbox, RgbNchwFrame},
  model::{
    CocoaLabel, DetectItem, DetectResult, Model, ModelLoader, WithLabel,
    nms::{MAX_DETECTIONS, non_maximum_suppression},
  },
};

const YOLOV8_INPUT_SIZE: u32 = 640;
const YOLOV8_BOX_DIMS: usize = 4;

#[derive(Error, Debug)]
pub enum YoloV8Error {
  #[error("模型加载错误: {0}")]
  ModelLoadError(std::io::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("ONNX Runtime 错误: {0}")]
  Runtime(String),
  #[error("模型输出形状无效: {0:?}")]
  OutputShape(Vec<usize>),
}

impl From<std::io::Error> for YoloV8Error {
  fn from(err: std::io::Error) -> Self {
    YoloV8Error::ModelLoadError(err)
  }
}

impl YoloV8Error {
  fn runtime(msg: &str, e: impl std::fmt::Display) -> Self {
    YoloV8Error::Runtime(format!("{}: {}", msg, e))
  }
}

pub struct YoloV8 {
  session: Session,
  input_name: String,
  output_name: String,
  input_size: u32,
  params: DetectParams,
}

pub struct YoloV8Builder {
  model_path: PathBuf,
  params: DetectParams,
  input_size: Option<u32>,
  intra_threads: Option<usize>,
}

impl YoloV8Builder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      params: DetectParams::default(),
      input_size: None,
      intra_threads: None,
    }
  }

  pub fn params(mut self, params: DetectParams) -> Self {
    self.params = params;
    self
  }

  /// 覆盖模型输入尺寸（动态输入形状的模型需要）
  pub fn input_size(mut self, size: Option<u32>) -> Self {
    self.input_size = size;
    self
  }

  pub fn intra_threads(mut self, threads: Option<usize>) -> Self {
    self.intra_threads = threads;
    self
  }

  pub fn build(self) -> Result<YoloV8, YoloV8Error> {
    info!("加载模型文件: {}", self.model_path.display());
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 ONNX Runtime 推理会话");
    let mut builder = Session::builder()
      .map_err(|e| YoloV8Error::runtime("无法创建会话构建器", e))?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(|e| YoloV8Error::runtime("无法设置图优化级别", e))?;
    if let Some(threads) = self.intra_threads {
      builder = builder
        .with_intra_threads(threads)
        .map_err(|e| YoloV8Error::runtime("无法设置线程数", e))?;
    }
    let session = builder
      .commit_from_memory(&model_data)
      .map_err(|e| YoloV8Error::ModelInvalid(e.to_string()))?;

    let input = session
      .inputs
      .first()
      .ok_or_else(|| YoloV8Error::ModelInvalid("模型没有输入".to_string()))?;
    let input_name = input.name.clone();
    let declared_size = input
      .input_type
      .tensor_shape()
      .and_then(|shape| shape.get(3).copied())
      .filter(|&dim| dim > 0)
      .map(|dim| dim as u32);
    let output_name = session
      .outputs
      .first()
      .map(|output| output.name.clone())
      .ok_or_else(|| YoloV8Error::ModelInvalid("模型没有输出".to_string()))?;

    let input_size = self
      .input_size
      .or(declared_size)
      .unwrap_or(YOLOV8_INPUT_SIZE);
    debug!("模型输入: {} ({}x{})", input_name, input_size, input_size);
    debug!("模型输出: {}", output_name);
    info!("模型加载完成");

    Ok(YoloV8 {
      session,
      input_name,
      output_name,
      input_size,
      params: self.params,
    })
  }
}

impl YoloV8 {
  fn run(&mut self, input: &Array4<f32>) -> Result<(Vec<usize>, Vec<f32>), YoloV8Error> {
    let input = input.as_standard_layout();
    let tensor =
      TensorRef::from_array_view(&input).map_err(|e| YoloV8Error::runtime("无法创建输入张量", e))?;

    let outputs = self
      .session
      .run(ort::inputs![self.input_name.as_str() => tensor])
      .map_err(|e| YoloV8Error::runtime("推理失败", e))?;
    let output = outputs
      .get(self.output_name.as_str())
      .ok_or_else(|| YoloV8Error::ModelInvalid(format!("找不到输出 {}", self.output_name)))?;

    let (shape, data) = output
      .try_extract_tensor::<f32>()
      .map_err(|e| YoloV8Error::runtime("无法读取输出张量", e))?;
    let shape = shape.iter().map(|&d| d as usize).collect();
    Ok((shape, data.to_vec()))
  }
}

impl Model for YoloV8 {
  type Input = RgbImage;
  type Output = DetectResult<CocoaLabel>;
  type Error = YoloV8Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("预处理输入图像: {}x{}", input.width(), input.height());
    let frame = RgbNchwFrame::letterbox(input, self.input_size);

    debug!("执行模型推理");
    let (shape, data) = self.run(frame.tensor())?;
    debug!("模型输出形状: {:?}", shape);

    decode_output(&data, &shape, frame.geometry(), &self.params)
  }
}

/// 解码 `[1, 4 + nc, N]` 形式的 YOLOv8 检测头输出
pub fn decode_output(
  data: &[f32],
  shape: &[usize],
  letterbox: &Letterbox,
  params: &DetectParams,
) -> Result<DetectResult<CocoaLabel>, YoloV8Error> {
  let [batch, features, anchors] = shape else {
    return Err(YoloV8Error::OutputShape(shape.to_vec()));
  };
  let (features, anchors) = (*features, *anchors);
  if *batch != 1 || features <= YOLOV8_BOX_DIMS || data.len() != features * anchors {
    return Err(YoloV8Error::OutputShape(shape.to_vec()));
  }

  let class_num = features - YOLOV8_BOX_DIMS;
  let mut candidates = Vec::new();
  for i in 0..anchors {
    let (class_id, score) = (0..class_num)
      .map(|c| (c, data[(YOLOV8_BOX_DIMS + c) * anchors + i]))
      .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

    if score <= params.confidence {
      continue;
    }

    let cx = data[i];
    let cy = data[anchors + i];
    let w = data[2 * anchors + i];
    let h = data[3 * anchors + i];

    candidates.push(DetectItem {
      kind: CocoaLabel::from_label_id(class_id as u32),
      score,
      bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
    });
  }
  debug!("置信度过滤后候选框: {}", candidates.len());

  let items: Vec<_> = non_maximum_suppression(candidates, params.iou, MAX_DETECTIONS)
    .into_iter()
    .map(|item| DetectItem {
      bbox: letterbox.to_normalized(item.bbox),
      ..item
    })
    .filter(|item| item.bbox[2] > item.bbox[0] && item.bbox[3] > item.bbox[1])
    .collect();
  debug!("检测到 {} 个物体", items.len());

  Ok(DetectResult::from(items))
}

#[derive(Debug, Default, Clone)]
pub struct YoloV8Loader {
  pub input_size: Option<u32>,
  pub intra_threads: Option<usize>,
}

impl YoloV8Loader {
  pub fn from_config(config: &AppConfig) -> Self {
    Self {
      input_size: config.input_size,
      intra_threads: config.intra_threads,
    }
  }
}

impl ModelLoader for YoloV8Loader {
  type Error = YoloV8Error;
  type Model = YoloV8;

  fn load(&self, path: &Path, params: &DetectParams) -> Result<Self::Model, Self::Error> {
    YoloV8Builder::new(path)
      .params(*params)
      .input_size(self.input_size)
      .intra_threads(self.intra_threads)
      .build()
  }
}
