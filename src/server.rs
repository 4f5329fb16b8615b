// 该文件是 Cocoa Detect （可可苗检测） 项目的一部分。
// src/server.rs - 网页服务
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

use std::sync::Arc;

use axum::{
  Json, Router,
  extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
  http::{HeaderValue, StatusCode, header},
  response::{Html, IntoResponse, Response},
  routing::{get, post},
};
use serde::Serialize;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::{
  config::AppConfig,
  input::UploadError,
  model::ModelLoader,
  task::{DetectError, DetectionService},
};

const INDEX_PAGE: &str = include_str!("server/index.html");

/// multipart 中上传文件的字段名
pub const UPLOAD_FIELD: &str = "file";
/// 以 JSON 形式携带检测统计的响应头
pub const SUMMARY_HEADER: &str = "x-detection-summary";

#[derive(Error, Debug)]
pub enum ApiError {
  #[error("缺少上传文件字段 `file`")]
  MissingFile,
  #[error("请求格式错误: {0}")]
  Multipart(#[from] MultipartError),
  #[error(transparent)]
  Detect(#[from] DetectError),
  #[error("检测任务异常退出: {0}")]
  Join(#[from] tokio::task::JoinError),
  #[error("内部错误: {0}")]
  Internal(String),
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match self {
      ApiError::MissingFile => StatusCode::BAD_REQUEST,
      ApiError::Multipart(e) => e.status(),
      ApiError::Detect(DetectError::Upload(
        UploadError::UnsupportedType(_) | UploadError::ContentMismatch { .. },
      )) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
      ApiError::Detect(DetectError::Upload(UploadError::Empty) | DetectError::Decode(_)) => {
        StatusCode::BAD_REQUEST
      }
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  // 返回给页面的简短英文说明，详细原因只写入日志
  fn public_message(&self, status: StatusCode) -> &'static str {
    match self {
      ApiError::MissingFile => "Missing upload field `file`.",
      ApiError::Multipart(_) if status == StatusCode::PAYLOAD_TOO_LARGE => {
        "Upload exceeds the size limit."
      }
      ApiError::Multipart(_) => "Malformed upload request.",
      ApiError::Detect(DetectError::Upload(UploadError::UnsupportedType(_))) => {
        "Unsupported file type. Upload a .tif, .tiff, .jpg, .jpeg or .png image."
      }
      ApiError::Detect(DetectError::Upload(UploadError::ContentMismatch { .. })) => {
        "File content does not match its extension."
      }
      ApiError::Detect(DetectError::Upload(UploadError::Empty)) => "The uploaded file is empty.",
      ApiError::Detect(DetectError::Decode(_)) => "The image could not be decoded.",
      _ => "Detection failed. See the server log for details.",
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!("请求处理失败: {}", self);
    } else {
      warn!("请求被拒绝: {}", self);
    }
    (status, self.public_message(status)).into_response()
  }
}

#[derive(Serialize)]
struct HealthResponse {
  status: &'static str,
  version: &'static str,
}

pub fn router<L>(service: Arc<DetectionService<L>>, max_upload_bytes: usize) -> Router
where
  L: ModelLoader + Send + Sync + 'static,
{
  Router::new()
    .route("/", get(index))
    .route("/health", get(health))
    .route("/api/detect", post(detect::<L>))
    .layer(DefaultBodyLimit::max(max_upload_bytes))
    .layer(TraceLayer::new_for_http())
    .with_state(service)
}

pub async fn serve<L>(service: Arc<DetectionService<L>>, config: &AppConfig) -> std::io::Result<()>
where
  L: ModelLoader + Send + Sync + 'static,
{
  let app = router(service, config.max_upload_bytes);
  let listener = tokio::net::TcpListener::bind(config.listen).await?;
  info!("服务已启动: http://{}", listener.local_addr()?);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!("无法监听中断信号: {}", e);
    std::future::pending::<()>().await;
  }
  info!("收到中断信号，准备退出...");
}

async fn index() -> Html<&'static str> {
  Html(INDEX_PAGE)
}

async fn health() -> Json<HealthResponse> {
  Json(HealthResponse {
    status: "ok",
    version: env!("CARGO_PKG_VERSION"),
  })
}

async fn detect<L>(
  State(service): State<Arc<DetectionService<L>>>,
  mut multipart: Multipart,
) -> Result<Response, ApiError>
where
  L: ModelLoader + Send + Sync + 'static,
{
  let mut upload = None;
  while let Some(field) = multipart.next_field().await? {
    if field.name() == Some(UPLOAD_FIELD) {
      let file_name = field.file_name().unwrap_or_default().to_string();
      let bytes = field.bytes().await?;
      upload = Some((file_name, bytes));
      break;
    }
  }
  let (file_name, bytes) = upload.ok_or(ApiError::MissingFile)?;

  let outcome =
    tokio::task::spawn_blocking(move || service.handle_request(&file_name, &bytes)).await??;

  let summary =
    serde_json::to_string(&outcome.summary).map_err(|e| ApiError::Internal(e.to_string()))?;
  let summary = HeaderValue::from_str(&summary).map_err(|e| ApiError::Internal(e.to_string()))?;

  let mut response = (
    StatusCode::OK,
    [(header::CONTENT_TYPE, "image/png")],
    outcome.png,
  )
    .into_response();
  response.headers_mut().insert(SUMMARY_HEADER, summary);
  Ok(response)
}
