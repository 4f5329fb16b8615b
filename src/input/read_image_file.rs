// 该文件是 Cocoa Detect （可可苗检测） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, input::UploadKind};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("Unsupported image type: {0}")]
  UnsupportedType(String),
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
}

/// `image:///path/to/tile.tif` 形式的本地图像
pub struct ImageFileInput {
  path: PathBuf,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let path = PathBuf::from(url.path());
    if UploadKind::from_file_name(url.path()).is_none() {
      return Err(ImageFileInputError::UnsupportedType(url.path().to_string()));
    }

    Ok(ImageFileInput { path })
  }
}

impl ImageFileInput {
  pub fn file_name(&self) -> String {
    self
      .path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_default()
  }

  /// 读取原始字节，交给与网页上传相同的处理流程
  pub fn read_bytes(&self) -> Result<Vec<u8>, ImageFileInputError> {
    Ok(std::fs::read(&self.path)?)
  }
}
