// 该文件是 Cocoa Detect （可可苗检测） 项目的一部分。
// src/frame.rs - 模型输入帧（letterbox + NCHW）
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

use image::{RgbImage, imageops::FilterType};
use ndarray::Array4;

const RGB_CHANNELS: usize = 3;
const LETTERBOX_PAD_VALUE: u8 = 114;

/// 原图到正方形模型输入之间的缩放与填充关系
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub scale: f32,
  pub pad_x: u32,
  pub pad_y: u32,
  pub resized_width: u32,
  pub resized_height: u32,
  pub source_width: u32,
  pub source_height: u32,
}

impl Letterbox {
  pub fn new(source_width: u32, source_height: u32, target: u32) -> Self {
    let scale = (target as f32 / source_width as f32).min(target as f32 / source_height as f32);
    let resized_width = ((source_width as f32 * scale).round() as u32).clamp(1, target);
    let resized_height = ((source_height as f32 * scale).round() as u32).clamp(1, target);

    Self {
      scale,
      pad_x: (target - resized_width) / 2,
      pad_y: (target - resized_height) / 2,
      resized_width,
      resized_height,
      source_width,
      source_height,
    }
  }

  /// 将模型输入坐标系下的 [x_min, y_min, x_max, y_max] 映射为原图归一化坐标
  pub fn to_normalized(&self, bbox: [f32; 4]) -> [f32; 4] {
    let w = self.source_width as f32;
    let h = self.source_height as f32;
    let x = |v: f32| ((v - self.pad_x as f32) / self.scale).clamp(0.0, w) / w;
    let y = |v: f32| ((v - self.pad_y as f32) / self.scale).clamp(0.0, h) / h;
    [x(bbox[0]), y(bbox[1]), x(bbox[2]), y(bbox[3])]
  }
}

/// 归一化到 [0, 1] 的 NCHW 浮点输入
#[derive(Debug, Clone)]
pub struct RgbNchwFrame {
  tensor: Array4<f32>,
  letterbox: Letterbox,
}

impl RgbNchwFrame {
  pub fn letterbox(image: &RgbImage, target: u32) -> Self {
    let (width, height) = image.dimensions();
    let letterbox = Letterbox::new(width, height, target);
    let resized = image::imageops::resize(
      image,
      letterbox.resized_width,
      letterbox.resized_height,
      FilterType::Triangle,
    );

    let size = target as usize;
    let pad = LETTERBOX_PAD_VALUE as f32 / 255.0;
    let mut tensor = Array4::<f32>::from_elem((1, RGB_CHANNELS, size, size), pad);

    let (pad_x, pad_y) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
    for (x, y, pixel) in resized.enumerate_pixels() {
      for c in 0..RGB_CHANNELS {
        tensor[[0, c, y as usize + pad_y, x as usize + pad_x]] = pixel[c] as f32 / 255.0;
      }
    }

    Self { tensor, letterbox }
  }

  pub fn tensor(&self) -> &Array4<f32> {
    &self.tensor
  }

  pub fn geometry(&self) -> &Letterbox {
    &self.letterbox
  }
}

#[cfg(test)]
mod tests {
  use image::Rgb;

  use super::*;

  #[test]
  fn wide_image_is_padded_vertically() {
    let letterbox = Letterbox::new(1280, 640, 640);
    assert_eq!(letterbox.scale, 0.5);
    assert_eq!(letterbox.pad_x, 0);
    assert_eq!(letterbox.pad_y, 160);
    assert_eq!((letterbox.resized_width, letterbox.resized_height), (640, 320));
  }

  #[test]
  fn boxes_map_back_to_source() {
    let letterbox = Letterbox::new(1280, 640, 640);
    let bbox = letterbox.to_normalized([0.0, 160.0, 320.0, 320.0]);
    assert_eq!(bbox, [0.0, 0.0, 0.5, 0.5]);

    let clamped = letterbox.to_normalized([-10.0, 0.0, 700.0, 700.0]);
    assert_eq!(clamped, [0.0, 0.0, 1.0, 1.0]);
  }

  #[test]
  fn tensor_carries_pixels_and_padding() {
    let image = RgbImage::from_pixel(4, 2, Rgb([255, 0, 51]));
    let frame = RgbNchwFrame::letterbox(&image, 8);

    assert_eq!(frame.tensor().shape(), &[1, 3, 8, 8]);

    let pad = 114.0 / 255.0;
    assert_eq!(frame.tensor()[[0, 0, 0, 0]], pad);
    assert_eq!(frame.tensor()[[0, 0, 4, 4]], 1.0);
    assert_eq!(frame.tensor()[[0, 1, 4, 4]], 0.0);
    assert_eq!(frame.tensor()[[0, 2, 4, 4]], 0.2);
  }
}
