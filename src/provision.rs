// 该文件是 Cocoa Detect （可可苗检测） 项目的一部分。
// src/provision.rs - 模型权重文件获取
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

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

#[derive(Error, Debug)]
pub enum ProvisionError {
  #[error("模型文件不存在: {0}")]
  Missing(String),
  #[error("未配置模型下载地址")]
  MissingUrl,
  #[error("未启用远程下载功能")]
  RemoteDisabled,
  #[error("下载失败: {url}, 错误: {message}")]
  Network { url: String, message: String },
  #[error("下载失败: {url}, HTTP 状态码 {status}")]
  HttpStatus { url: String, status: u16 },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 从远程地址获取字节
pub trait Fetch {
  fn fetch(&self, url: &Url) -> Result<Vec<u8>, ProvisionError>;
}

impl<F: Fetch + ?Sized> Fetch for &F {
  fn fetch(&self, url: &Url) -> Result<Vec<u8>, ProvisionError> {
    (**self).fetch(url)
  }
}

/// 模型权重的来源
pub trait ArtifactSource: Send + Sync {
  /// 保证 `local_path` 处存在模型文件
  fn provision(&self, local_path: &Path) -> Result<(), ProvisionError>;
}

/// 本地不存在时下载模型，已存在时什么也不做
pub fn ensure_model<F: Fetch>(
  local_path: &Path,
  remote_url: &Url,
  fetcher: &F,
) -> Result<(), ProvisionError> {
  if local_path.is_file() {
    info!("模型文件已存在: {}", local_path.display());
    return Ok(());
  }

  download(local_path, remote_url, fetcher)
}

// 失败时可能留下不完整的文件
fn download<F: Fetch>(local_path: &Path, remote_url: &Url, fetcher: &F) -> Result<(), ProvisionError> {
  info!("正在下载模型: {} -> {}", remote_url, local_path.display());
  let bytes = fetcher.fetch(remote_url)?;
  debug!(
    "模型文件大小: {:.2} MB",
    bytes.len() as f64 / (1024.0 * 1024.0)
  );

  if let Some(parent) = local_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(local_path, &bytes)?;

  info!("模型下载完成");
  Ok(())
}

pub struct LocalOnly;

impl ArtifactSource for LocalOnly {
  fn provision(&self, local_path: &Path) -> Result<(), ProvisionError> {
    if local_path.is_file() {
      info!("使用本地模型文件: {}", local_path.display());
      Ok(())
    } else {
      Err(ProvisionError::Missing(local_path.display().to_string()))
    }
  }
}

pub struct RemoteDownload<F> {
  url: Url,
  fetcher: F,
}

impl<F> RemoteDownload<F> {
  pub fn new(url: Url, fetcher: F) -> Self {
    Self { url, fetcher }
  }
}

impl<F: Fetch + Send + Sync> ArtifactSource for RemoteDownload<F> {
  fn provision(&self, local_path: &Path) -> Result<(), ProvisionError> {
    download(local_path, &self.url, &self.fetcher)
  }
}

pub struct CachedRemote<F> {
  url: Url,
  fetcher: F,
}

impl<F> CachedRemote<F> {
  pub fn new(url: Url, fetcher: F) -> Self {
    Self { url, fetcher }
  }
}

impl<F: Fetch + Send + Sync> ArtifactSource for CachedRemote<F> {
  fn provision(&self, local_path: &Path) -> Result<(), ProvisionError> {
    ensure_model(local_path, &self.url, &self.fetcher)
  }
}

#[cfg(feature = "remote_download")]
#[derive(Debug, Default, Clone)]
pub struct HttpFetcher;

#[cfg(feature = "remote_download")]
impl Fetch for HttpFetcher {
  fn fetch(&self, url: &Url) -> Result<Vec<u8>, ProvisionError> {
    use std::io::Read;

    let response = ureq::get(url.as_str()).call().map_err(|e| match e {
      ureq::Error::Status(status, _) => ProvisionError::HttpStatus {
        url: url.to_string(),
        status,
      },
      other => ProvisionError::Network {
        url: url.to_string(),
        message: other.to_string(),
      },
    })?;

    let mut bytes = match response
      .header("Content-Length")
      .and_then(|len| len.parse::<usize>().ok())
    {
      Some(len) => Vec::with_capacity(len),
      None => Vec::new(),
    };
    response.into_reader().read_to_end(&mut bytes)?;
    Ok(bytes)
  }
}
