// 该文件是 Cocoa Detect （可可苗检测） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use crate::model::{DetectItem, WithLabel};

/// 单张图像最多保留的检测数
pub const MAX_DETECTIONS: usize = 300;

pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
  let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
  let inter = inter_w * inter_h;

  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - inter;

  if union <= 0.0 { 0.0 } else { inter / union }
}

/// 按类别做 NMS：同类且 IoU 大于阈值的低分框被抑制
pub fn non_maximum_suppression<T: WithLabel>(
  mut items: Vec<DetectItem<T>>,
  iou_threshold: f32,
  max_detections: usize,
) -> Vec<DetectItem<T>> {
  items.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut kept: Vec<DetectItem<T>> = Vec::new();
  for item in items {
    if kept.len() >= max_detections {
      break;
    }
    let class_id = item.kind.to_label_id();
    let suppressed = kept
      .iter()
      .any(|k| k.kind.to_label_id() == class_id && iou(&k.bbox, &item.bbox) > iou_threshold);
    if !suppressed {
      kept.push(item);
    }
  }
  kept
}
