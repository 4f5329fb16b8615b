// 该文件是 Cocoa Detect （可可苗检测） 项目的一部分。
// src/config.rs - 运行配置
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
  net::{Ipv4Addr, SocketAddr},
  path::PathBuf,
};

use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::provision::{ArtifactSource, CachedRemote, LocalOnly, ProvisionError, RemoteDownload};

/// 部署中固定使用的置信度阈值
pub const DEFAULT_CONFIDENCE: f32 = 0.05;
/// 部署中固定使用的 NMS IoU 阈值
pub const DEFAULT_IOU: f32 = 0.73;
pub const DEFAULT_MODEL_PATH: &str = "models/best.onnx";
pub const DEFAULT_LISTEN_PORT: u16 = 8501;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("置信度阈值超出范围 [0, 1]: {0}")]
  ConfidenceOutOfRange(f32),
  #[error("IoU 阈值超出范围 [0, 1]: {0}")]
  IouOutOfRange(f32),
}

/// 检测阈值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectParams {
  pub confidence: f32,
  pub iou: f32,
}

impl Default for DetectParams {
  fn default() -> Self {
    Self {
      confidence: DEFAULT_CONFIDENCE,
      iou: DEFAULT_IOU,
    }
  }
}

impl DetectParams {
  pub fn new(confidence: f32, iou: f32) -> Result<Self, ConfigError> {
    if !(0.0..=1.0).contains(&confidence) {
      return Err(ConfigError::ConfidenceOutOfRange(confidence));
    }
    if !(0.0..=1.0).contains(&iou) {
      return Err(ConfigError::IouOutOfRange(iou));
    }
    Ok(Self { confidence, iou })
  }
}

/// 模型获取策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ProvisionStrategy {
  /// 只使用本地文件，不访问网络
  Local,
  /// 每次启动都重新下载
  Remote,
  /// 本地不存在时才下载
  #[default]
  Cached,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub model_path: PathBuf,
  pub model_url: Option<Url>,
  pub strategy: ProvisionStrategy,
  pub params: DetectParams,
  pub temp_dir: Option<PathBuf>,
  pub font_path: Option<PathBuf>,
  /// 模型输入尺寸，不指定时从模型读取
  pub input_size: Option<u32>,
  pub intra_threads: Option<usize>,
  pub listen: SocketAddr,
  pub max_upload_bytes: usize,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      model_path: PathBuf::from(DEFAULT_MODEL_PATH),
      model_url: None,
      strategy: ProvisionStrategy::default(),
      params: DetectParams::default(),
      temp_dir: None,
      font_path: None,
      input_size: None,
      intra_threads: None,
      listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_LISTEN_PORT)),
      max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    }
  }
}

impl AppConfig {
  /// 按配置的策略构造模型来源
  #[cfg(feature = "remote_download")]
  pub fn artifact_source(&self) -> Result<Box<dyn ArtifactSource>, ProvisionError> {
    use crate::provision::HttpFetcher;

    self.artifact_source_with(HttpFetcher::default())
  }

  #[cfg(not(feature = "remote_download"))]
  pub fn artifact_source(&self) -> Result<Box<dyn ArtifactSource>, ProvisionError> {
    match (self.strategy, &self.model_url) {
      (ProvisionStrategy::Local, _) | (ProvisionStrategy::Cached, None) => Ok(Box::new(LocalOnly)),
      _ => Err(ProvisionError::RemoteDisabled),
    }
  }

  pub fn artifact_source_with<F>(&self, fetcher: F) -> Result<Box<dyn ArtifactSource>, ProvisionError>
  where
    F: crate::provision::Fetch + Send + Sync + 'static,
  {
    match self.strategy {
      ProvisionStrategy::Local => Ok(Box::new(LocalOnly)),
      ProvisionStrategy::Remote => {
        let url = self.model_url.clone().ok_or(ProvisionError::MissingUrl)?;
        Ok(Box::new(RemoteDownload::new(url, fetcher)))
      }
      // 未配置下载地址时只能依赖本地文件
      ProvisionStrategy::Cached => match &self.model_url {
        Some(url) => Ok(Box::new(CachedRemote::new(url.clone(), fetcher))),
        None => {
          warn!("未配置模型下载地址，只使用本地模型文件");
          Ok(Box::new(LocalOnly))
        }
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::provision::Fetch;

  #[test]
  fn defaults_match_deployment_thresholds() {
    let params = DetectParams::default();
    assert_eq!(params.confidence, 0.05);
    assert_eq!(params.iou, 0.73);
    assert_eq!(AppConfig::default().strategy, ProvisionStrategy::Cached);
  }

  #[test]
  fn rejects_thresholds_outside_unit_range() {
    assert_eq!(
      DetectParams::new(1.5, 0.5),
      Err(ConfigError::ConfidenceOutOfRange(1.5))
    );
    assert_eq!(
      DetectParams::new(0.5, -0.1),
      Err(ConfigError::IouOutOfRange(-0.1))
    );
    assert!(DetectParams::new(0.0, 1.0).is_ok());
  }

  struct NoNetwork;

  impl Fetch for NoNetwork {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>, ProvisionError> {
      Err(ProvisionError::Network {
        url: url.to_string(),
        message: "offline".to_string(),
      })
    }
  }

  #[test]
  fn remote_strategy_requires_url() {
    let config = AppConfig {
      strategy: ProvisionStrategy::Remote,
      ..AppConfig::default()
    };
    assert!(matches!(
      config.artifact_source_with(NoNetwork),
      Err(ProvisionError::MissingUrl)
    ));
  }

  #[test]
  fn cached_strategy_without_url_uses_local_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("best.onnx");
    let config = AppConfig {
      model_path: path.clone(),
      ..AppConfig::default()
    };

    let source = config.artifact_source_with(NoNetwork).unwrap();
    assert!(matches!(
      source.provision(&path),
      Err(ProvisionError::Missing(_))
    ));

    std::fs::write(&path, b"weights").unwrap();
    source.provision(&path).unwrap();
  }

  #[test]
  fn cached_strategy_surfaces_fetch_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("best.onnx");
    let config = AppConfig {
      model_path: path.clone(),
      model_url: Some(Url::parse("https://models.example.org/best.onnx").unwrap()),
      ..AppConfig::default()
    };

    let source = config.artifact_source_with(NoNetwork).unwrap();
    assert!(matches!(
      source.provision(&path),
      Err(ProvisionError::Network { .. })
    ));
    assert!(!path.exists());
  }
}
