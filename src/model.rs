// 该文件是 Cocoa Detect （可可苗检测） 项目的一部分。
// src/model.rs - 模型
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

use std::path::Path;

use image::RgbImage;

use crate::config::DetectParams;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 每次请求都从权重文件重新加载模型
pub trait ModelLoader {
  type Error: std::error::Error + Send + Sync + 'static;
  type Model: Model<Input = RgbImage, Output = DetectResult<CocoaLabel>, Error = Self::Error>;

  fn load(&self, path: &Path, params: &DetectParams) -> Result<Self::Model, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem<T> {
  pub kind: T,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectResult<T> {
  pub items: Box<[DetectItem<T>]>,
}

impl<T> Default for DetectResult<T> {
  fn default() -> Self {
    Self {
      items: Box::new([]),
    }
  }
}

impl<T> From<Vec<DetectItem<T>>> for DetectResult<T> {
  fn from(items: Vec<DetectItem<T>>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

impl<T: WithLabel> DetectResult<T> {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn count_of(&self, kind: &T) -> usize {
    let id = kind.to_label_id();
    self
      .items
      .iter()
      .filter(|item| item.kind.to_label_id() == id)
      .count()
  }
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  fn to_label_id(&self) -> u32;
  fn from_label_id(id: u32) -> Self;
}

/// 检测类别：0 为可可苗，1 为种植穴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CocoaLabel {
  Plant,
  Hole,
  Other(u32),
}

impl WithLabel for CocoaLabel {
  fn to_label_str(&self) -> String {
    match self {
      CocoaLabel::Plant => "cocoa".to_string(),
      CocoaLabel::Hole => "hole".to_string(),
      CocoaLabel::Other(id) => format!("class-{}", id),
    }
  }

  fn to_label_id(&self) -> u32 {
    match self {
      CocoaLabel::Plant => 0,
      CocoaLabel::Hole => 1,
      CocoaLabel::Other(id) => *id,
    }
  }

  fn from_label_id(id: u32) -> Self {
    match id {
      0 => CocoaLabel::Plant,
      1 => CocoaLabel::Hole,
      other => CocoaLabel::Other(other),
    }
  }
}

pub mod nms;
mod yolov8;
pub use self::yolov8::{YoloV8, YoloV8Builder, YoloV8Error, YoloV8Loader, decode_output};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn label_ids_round_trip() {
    for id in [0, 1, 7] {
      assert_eq!(CocoaLabel::from_label_id(id).to_label_id(), id);
    }
    assert_eq!(CocoaLabel::from_label_id(7).to_label_str(), "class-7");
  }

  #[test]
  fn counts_items_per_class() {
    let item = |kind| DetectItem {
      kind,
      score: 0.9,
      bbox: [0.0, 0.0, 0.1, 0.1],
    };
    let result = DetectResult::from(vec![
      item(CocoaLabel::Plant),
      item(CocoaLabel::Hole),
      item(CocoaLabel::Plant),
    ]);

    assert_eq!(result.len(), 3);
    assert_eq!(result.count_of(&CocoaLabel::Plant), 2);
    assert_eq!(result.count_of(&CocoaLabel::Hole), 1);
    assert_eq!(result.count_of(&CocoaLabel::Other(4)), 0);
  }
}
