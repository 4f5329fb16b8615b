// 该文件是 Cocoa Detect （可可苗检测） 项目的一部分。
// src/output.rs - 输出定义
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

use std::io::Cursor;

use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{CocoaLabel, DetectResult};

pub mod draw;

mod save_image_file;
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

pub const DETECTION_CAPTION: &str = "Detected: Cocoa Plants + Holes";

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("图像编码错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("字体加载错误: {0}")]
  FontError(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 叠加了检测框的图像及其检测结果
#[derive(Debug, Clone)]
pub struct AnnotatedImage {
  pub image: RgbImage,
  pub result: DetectResult<CocoaLabel>,
}

impl AnnotatedImage {
  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn summary(&self) -> DetectionSummary {
    let plants = self.result.count_of(&CocoaLabel::Plant);
    let holes = self.result.count_of(&CocoaLabel::Hole);
    DetectionSummary {
      caption: DETECTION_CAPTION.to_string(),
      width: self.width(),
      height: self.height(),
      plants,
      holes,
      total: self.result.len(),
    }
  }

  pub fn encode_png(&self) -> Result<Vec<u8>, OutputError> {
    let mut bytes = Cursor::new(Vec::new());
    self.image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSummary {
  pub caption: String,
  pub width: u32,
  pub height: u32,
  pub plants: usize,
  pub holes: usize,
  pub total: usize,
}

#[cfg(test)]
mod tests {
  use image::Rgb;

  use super::*;
  use crate::model::DetectItem;

  #[test]
  fn summary_counts_each_class() {
    let item = |kind| DetectItem {
      kind,
      score: 0.5,
      bbox: [0.1, 0.1, 0.2, 0.2],
    };
    let annotated = AnnotatedImage {
      image: RgbImage::new(32, 16),
      result: DetectResult::from(vec![
        item(CocoaLabel::Plant),
        item(CocoaLabel::Hole),
        item(CocoaLabel::Hole),
        item(CocoaLabel::Other(5)),
      ]),
    };

    let summary = annotated.summary();
    assert_eq!(summary.caption, DETECTION_CAPTION);
    assert_eq!((summary.width, summary.height), (32, 16));
    assert_eq!((summary.plants, summary.holes, summary.total), (1, 2, 4));
  }

  #[test]
  fn encodes_png_with_same_dimensions() {
    let annotated = AnnotatedImage {
      image: RgbImage::from_pixel(7, 3, Rgb([1, 2, 3])),
      result: DetectResult::default(),
    };

    let png = annotated.encode_png().unwrap();
    let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (7, 3));
  }
}
