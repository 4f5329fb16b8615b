// 该文件是 Cocoa Detect （可可苗检测） 项目的一部分。
// tests/common/mod.rs - 测试用模型与图像
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

#![allow(dead_code)]

use std::{
  io::Cursor,
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
};

use image::{ImageFormat, Rgb, RgbImage};
use thiserror::Error;

use cocoa_detect::{
  config::DetectParams,
  model::{CocoaLabel, DetectItem, DetectResult, Model, ModelLoader},
  output::draw::Draw,
  task::{DetectionService, InferenceRunner},
};

pub const MODEL_PATH: &str = "models/best.onnx";

#[derive(Error, Debug)]
#[error("fake model failure")]
pub struct FakeError;

#[derive(Debug, Default)]
pub struct Calls {
  pub loads: Vec<(PathBuf, DetectParams)>,
  pub inputs: Vec<(u32, u32)>,
}

/// 返回固定检测框的模型加载器
#[derive(Clone, Default)]
pub struct FakeLoader {
  pub calls: Arc<Mutex<Calls>>,
  pub items: Vec<DetectItem<CocoaLabel>>,
  pub fail_infer: bool,
}

pub struct FakeModel {
  calls: Arc<Mutex<Calls>>,
  items: Vec<DetectItem<CocoaLabel>>,
  fail_infer: bool,
}

impl ModelLoader for FakeLoader {
  type Error = FakeError;
  type Model = FakeModel;

  fn load(&self, path: &Path, params: &DetectParams) -> Result<FakeModel, FakeError> {
    self
      .calls
      .lock()
      .unwrap()
      .loads
      .push((path.to_path_buf(), *params));
    Ok(FakeModel {
      calls: self.calls.clone(),
      items: self.items.clone(),
      fail_infer: self.fail_infer,
    })
  }
}

impl Model for FakeModel {
  type Input = RgbImage;
  type Output = DetectResult<CocoaLabel>;
  type Error = FakeError;

  fn infer(&mut self, input: &RgbImage) -> Result<Self::Output, FakeError> {
    self
      .calls
      .lock()
      .unwrap()
      .inputs
      .push((input.width(), input.height()));
    if self.fail_infer {
      return Err(FakeError);
    }
    Ok(DetectResult::from(self.items.clone()))
  }
}

pub fn plant_and_hole() -> Vec<DetectItem<CocoaLabel>> {
  vec![
    DetectItem {
      kind: CocoaLabel::Plant,
      score: 0.91,
      bbox: [0.1, 0.1, 0.4, 0.4],
    },
    DetectItem {
      kind: CocoaLabel::Hole,
      score: 0.42,
      bbox: [0.5, 0.5, 0.8, 0.9],
    },
  ]
}

pub fn service(loader: FakeLoader, temp_dir: &Path) -> DetectionService<FakeLoader> {
  DetectionService::new(
    InferenceRunner::new(loader, Draw::default()),
    PathBuf::from(MODEL_PATH),
    DetectParams::default(),
  )
  .with_temp_dir(Some(temp_dir.to_path_buf()))
}

pub fn encoded_tile(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
  let image = RgbImage::from_pixel(width, height, Rgb([96, 128, 64]));
  let mut bytes = Cursor::new(Vec::new());
  image.write_to(&mut bytes, format).unwrap();
  bytes.into_inner()
}

pub fn dir_is_empty(dir: &Path) -> bool {
  std::fs::read_dir(dir).unwrap().next().is_none()
}
