//! Remote disk client (Yandex Disk REST API).
//!
//! Folder creation treats "already exists" as success. Uploads are two-step:
//! the API hands out a one-time `href`, and the bytes are `PUT` there.
//! Existing files are never overwritten; a name collision surfaces as an error.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::errors::{error_logging, AppError, AppResult};
use crate::traits::RemoteStorage;
use crate::wb::client::truncate_for_log;

const DISK_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct UploadLink {
    href: Option<String>,
}

#[derive(Clone)]
pub struct YandexDisk {
    http: reqwest::Client,
    upload_http: reqwest::Client,
    api_url: String,
}

impl YandexDisk {
    pub fn new(config: &StorageConfig) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("OAuth {}", config.disk_token.trim()))
                .map_err(|e| AppError::Config(format!("invalid disk token header: {}", e)))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(DISK_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("failed to create disk HTTP client: {}", e)))?;
        let upload_http = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("failed to create upload HTTP client: {}", e)))?;

        Ok(Self {
            http,
            upload_http,
            api_url: config.disk_api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Verify the token against the disk info endpoint
    pub async fn check_token(&self) -> AppResult<()> {
        let response = self.http.get(format!("{}/", self.api_url)).send().await?;
        match response.status() {
            status if status.is_success() => {
                info!("Disk token is valid");
                Ok(())
            }
            StatusCode::UNAUTHORIZED => Err(AppError::Config(
                "Disk token was rejected (401)".to_string(),
            )),
            status => Err(AppError::Storage(format!(
                "Disk info request returned {}",
                status
            ))),
        }
    }

    /// Create the top-level folders used by the bot
    pub async fn ensure_root_folders(&self, roots: &[&str]) -> AppResult<()> {
        info!(roots = ?roots, "Ensuring root folders on the remote disk");
        for root in roots {
            self.ensure_folder(root).await?;
        }
        Ok(())
    }

    fn resources_url(&self) -> String {
        format!("{}/resources", self.api_url)
    }
}

/// Disk paths are absolute
fn disk_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

#[async_trait]
impl RemoteStorage for YandexDisk {
    async fn ensure_folder(&self, path: &str) -> AppResult<()> {
        let path = disk_path(path);
        let response = self
            .http
            .put(self.resources_url())
            .query(&[("path", path.as_str())])
            .send()
            .await
            .map_err(|e| {
                let error = AppError::Storage(format!("folder request failed: {}", e));
                error_logging::log_storage_error(&error, "ensure_folder", Some(&path), None);
                error
            })?;

        match response.status() {
            StatusCode::CREATED => {
                info!(path = %path, "Folder created");
                Ok(())
            }
            StatusCode::CONFLICT => {
                debug!(path = %path, "Folder already exists");
                Ok(())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = AppError::Storage(format!(
                    "folder creation returned {}: {}",
                    status,
                    truncate_for_log(&body, 200)
                ));
                error_logging::log_storage_error(&error, "ensure_folder", Some(&path), None);
                Err(error)
            }
        }
    }

    async fn upload_bytes(&self, content: Vec<u8>, path: &str) -> AppResult<()> {
        let path = disk_path(path);
        let size = content.len();

        let response = self
            .http
            .get(format!("{}/upload", self.resources_url()))
            .query(&[("path", path.as_str()), ("overwrite", "false")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = AppError::Storage(format!(
                "upload link request returned {}: {}",
                status,
                truncate_for_log(&body, 200)
            ));
            error_logging::log_storage_error(&error, "upload_link", Some(&path), Some(size));
            return Err(error);
        }

        let link: UploadLink = serde_json::from_slice(&response.bytes().await?)?;
        let href = link.href.filter(|href| !href.is_empty()).ok_or_else(|| {
            AppError::Storage("upload link response carries no href".to_string())
        })?;

        let put = self.upload_http.put(&href).body(content).send().await?;
        let put_status = put.status();
        if put_status != StatusCode::OK && put_status != StatusCode::CREATED && put_status != StatusCode::ACCEPTED {
            let error = AppError::Storage(format!("upload returned {}", put_status));
            error_logging::log_storage_error(&error, "upload_bytes", Some(&path), Some(size));
            return Err(error);
        }

        if put_status == StatusCode::ACCEPTED {
            warn!(path = %path, "Upload accepted, disk is still processing the file");
        }
        info!(path = %path, size_bytes = size, "File uploaded to remote disk");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_path_is_absolute() {
        assert_eq!(disk_path("WB_Orders/1"), "/WB_Orders/1");
        assert_eq!(disk_path("/WB_Chats"), "/WB_Chats");
    }

    #[test]
    fn test_upload_link_decoding() {
        let link: UploadLink =
            serde_json::from_str(r#"{"href":"https://uploader/x","method":"PUT"}"#).unwrap();
        assert_eq!(link.href.as_deref(), Some("https://uploader/x"));

        let empty: UploadLink = serde_json::from_str("{}").unwrap();
        assert!(empty.href.is_none());
    }

    #[test]
    fn test_client_construction() {
        let config = StorageConfig {
            disk_token: "token".to_string(),
            ..StorageConfig::default()
        };
        let disk = YandexDisk::new(&config).unwrap();
        assert_eq!(disk.resources_url(), "https://cloud-api.yandex.net/v1/disk/resources");
    }
}
