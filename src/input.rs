// 该文件是 Cocoa Detect （可可苗检测） 项目的一部分。
// src/input.rs - 上传图像输入
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

use std::{
  io::Write,
  path::{Path, PathBuf},
};

use image::ImageFormat;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

/// 允许上传的文件扩展名（小写）及其图像类型
pub const SUPPORTED_EXTENSIONS: [(&str, UploadKind); 5] = [
  ("tif", UploadKind::Tiff),
  ("tiff", UploadKind::Tiff),
  ("jpg", UploadKind::Jpeg),
  ("jpeg", UploadKind::Jpeg),
  ("png", UploadKind::Png),
];

const TEMP_FILE_PREFIX: &str = "cocoa-upload-";

#[derive(Error, Debug)]
pub enum UploadError {
  #[error("上传内容为空")]
  Empty,
  #[error("不支持的文件类型: {0}")]
  UnsupportedType(String),
  #[error("文件内容与扩展名不符: 期望 {expected:?}, 实际 {found}")]
  ContentMismatch {
    expected: ImageFormat,
    found: String,
  },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
  Tiff,
  Jpeg,
  Png,
}

impl UploadKind {
  pub fn from_file_name(file_name: &str) -> Option<Self> {
    let extension = Path::new(file_name).extension()?.to_str()?;
    SUPPORTED_EXTENSIONS
      .iter()
      .find(|(ext, _)| extension.eq_ignore_ascii_case(ext))
      .map(|&(_, kind)| kind)
  }

  pub fn format(&self) -> ImageFormat {
    match self {
      UploadKind::Tiff => ImageFormat::Tiff,
      UploadKind::Jpeg => ImageFormat::Jpeg,
      UploadKind::Png => ImageFormat::Png,
    }
  }

  fn suffix(&self) -> &'static str {
    match self {
      UploadKind::Tiff => ".tif",
      UploadKind::Jpeg => ".jpg",
      UploadKind::Png => ".png",
    }
  }
}

/// 通过校验的上传图像，尚未落盘
#[derive(Debug)]
pub struct UploadedImage<'a> {
  name: String,
  kind: UploadKind,
  bytes: &'a [u8],
}

impl<'a> UploadedImage<'a> {
  /// 校验扩展名与文件头，不创建任何文件
  pub fn validate(file_name: &str, bytes: &'a [u8]) -> Result<Self, UploadError> {
    let kind = UploadKind::from_file_name(file_name)
      .ok_or_else(|| UploadError::UnsupportedType(file_name.to_string()))?;

    if bytes.is_empty() {
      return Err(UploadError::Empty);
    }

    match image::guess_format(bytes) {
      Ok(format) if format == kind.format() => {}
      Ok(format) => {
        return Err(UploadError::ContentMismatch {
          expected: kind.format(),
          found: format!("{:?}", format),
        });
      }
      Err(_) => {
        return Err(UploadError::ContentMismatch {
          expected: kind.format(),
          found: "unknown".to_string(),
        });
      }
    }

    Ok(Self {
      name: file_name.to_string(),
      kind,
      bytes,
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn kind(&self) -> UploadKind {
    self.kind
  }

  /// 写入一个新的临时文件，文件名每次调用都不同
  pub fn materialize(&self, temp_dir: Option<&Path>) -> Result<TempImage, UploadError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_FILE_PREFIX).suffix(self.kind.suffix());
    let mut file = match temp_dir {
      Some(dir) => builder.tempfile_in(dir)?,
      None => builder.tempfile()?,
    };

    file.write_all(self.bytes)?;
    file.flush()?;

    let path = file.path().to_path_buf();
    debug!("上传图像 {} 写入临时文件: {}", self.name, path.display());
    Ok(TempImage {
      file: Some(file),
      path,
    })
  }
}

/// 单次请求独占的临时图像文件，删除后或离开作用域时清理
#[derive(Debug)]
pub struct TempImage {
  file: Option<NamedTempFile>,
  path: PathBuf,
}

impl TempImage {
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 删除临时文件，可重复调用
  pub fn remove(&mut self) -> Result<(), std::io::Error> {
    match self.file.take() {
      Some(file) => {
        file.close()?;
        debug!("已删除临时文件: {}", self.path.display());
        Ok(())
      }
      None => Ok(()),
    }
  }
}

impl Drop for TempImage {
  fn drop(&mut self) {
    if let Err(e) = self.remove() {
      warn!("删除临时文件失败 {}: {}", self.path.display(), e);
    }
  }
}
