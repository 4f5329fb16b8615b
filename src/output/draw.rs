// 该文件是 Cocoa Detect （可可苗检测） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use tracing::info;

use crate::{
  model::{CocoaLabel, DetectItem, DetectResult, WithLabel},
  output::{AnnotatedImage, OutputError},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 未加载字体时按字符数估算宽度
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;

// 按类别编号取色：可可苗绿色，种植穴橙色
const LABEL_PALETTE: [[u8; 3]; 4] = [[34, 197, 94], [249, 115, 22], [59, 130, 246], [236, 72, 153]];

pub fn label_color<T: WithLabel>(kind: &T) -> [u8; 3] {
  LABEL_PALETTE[kind.to_label_id() as usize % LABEL_PALETTE.len()]
}

pub struct Draw {
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  thickness: i32,
  font: Option<FontVec>,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      thickness: BOX_THICKNESS,
      font: None,
    }
  }
}

impl Draw {
  /// 从 TTF/OTF 文件加载标签字体
  pub fn with_font_file(path: &Path) -> Result<Self, OutputError> {
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data).map_err(|e| OutputError::FontError(e.to_string()))?;
    info!("已加载标签字体: {}", path.display());
    Ok(Self {
      font: Some(font),
      ..Self::default()
    })
  }

  pub fn annotate(&self, mut image: RgbImage, result: DetectResult<CocoaLabel>) -> AnnotatedImage {
    self.draw_detections_on_image(&mut image, &result);
    AnnotatedImage { image, result }
  }

  // bbox 为归一化坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox_with_label<T: WithLabel>(&self, image: &mut RgbImage, item: &DetectItem<T>) {
    let (w, h) = (image.width() as f32, image.height() as f32);
    let color = Rgb(label_color(&item.kind));

    let x_min = ((item.bbox[0] * w).floor() as i32).clamp(0, w as i32 - 1);
    let y_min = ((item.bbox[1] * h).floor() as i32).clamp(0, h as i32 - 1);
    let x_max = ((item.bbox[2] * w).ceil() as i32).clamp(0, w as i32 - 1);
    let y_max = ((item.bbox[3] * h).ceil() as i32).clamp(0, h as i32 - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    for t in 0..self.thickness {
      let width = x_max - x_min + 1 - 2 * t;
      let height = y_max - y_min + 1 - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, color);
    }

    let label = format!("{} {:.2}", item.kind.to_label_str(), item.score);
    let scale = PxScale::from(self.font_size);

    let text_width = match &self.font {
      Some(font) => text_size(scale, font, &label).0 as i32,
      None => (label.len() as f32 * self.label_char_width) as i32,
    };

    // 标签放在边框上方，不超出图像
    let label_x = x_min;
    let label_y = (y_min - self.label_text_height).max(0);
    let label_width = text_width.min(w as i32 - label_x);
    let label_height = self.label_text_height.min(h as i32 - label_y);

    if label_width <= 0 || label_height <= 0 {
      return;
    }

    let rect = Rect::at(label_x, label_y).of_size(label_width as u32, label_height as u32);
    draw_filled_rect_mut(image, rect, color);

    if let Some(font) = &self.font {
      draw_text_mut(
        image,
        Rgb([255u8, 255u8, 255u8]),
        label_x,
        label_y + self.label_text_vertical_padding,
        scale,
        font,
        &label,
      );
    }
  }
}

pub trait DrawDetectionOnImage<T: WithLabel> {
  fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult<T>);
}

impl<T: WithLabel> DrawDetectionOnImage<T> for Draw {
  fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult<T>) {
    for item in result.items.iter() {
      self.draw_bbox_with_label(image, item);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn draws_box_outline_in_class_color() {
    let image = RgbImage::new(64, 64);
    let result = DetectResult::from(vec![DetectItem {
      kind: CocoaLabel::Plant,
      score: 0.9,
      bbox: [0.25, 0.5, 0.75, 0.9],
    }]);

    let annotated = Draw::default().annotate(image, result);

    assert_eq!((annotated.width(), annotated.height()), (64, 64));
    let plant = Rgb(label_color(&CocoaLabel::Plant));
    assert_eq!(*annotated.image.get_pixel(16, 40), plant);
    assert_eq!(*annotated.image.get_pixel(17, 41), plant);
    assert_eq!(*annotated.image.get_pixel(32, 50), Rgb([0, 0, 0]));
    // 标签底色
    assert_eq!(*annotated.image.get_pixel(20, 20), plant);
  }

  #[test]
  fn degenerate_boxes_are_skipped() {
    let image = RgbImage::new(8, 8);
    let result = DetectResult::from(vec![DetectItem {
      kind: CocoaLabel::Hole,
      score: 0.3,
      bbox: [0.5, 0.5, 0.5, 0.5],
    }]);

    let annotated = Draw::default().annotate(image, result);
    assert!(annotated.image.pixels().all(|p| *p == Rgb([0, 0, 0])));
  }

  #[test]
  fn classes_get_distinct_colors() {
    assert_ne!(label_color(&CocoaLabel::Plant), label_color(&CocoaLabel::Hole));
  }

  #[test]
  fn invalid_font_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("font.ttf");
    std::fs::write(&path, b"not a font").unwrap();
    assert!(matches!(
      Draw::with_font_file(&path),
      Err(OutputError::FontError(_))
    ));
  }
}
