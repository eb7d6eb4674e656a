//! Cloud upload.
//!
//! One artifact, one blocking HTTP PUT. The uploader never raises out of
//! `upload`: every transport and status failure is converted into an
//! `UploadResult` so the trigger loop can log and keep polling. With no
//! endpoint configured it degrades to "log and skip" for offline
//! deployments.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use url::Url;

const UPLOAD_RESOURCE_PATH: &str = "/api/camera/photo";
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Upload routing and identity, resolved once at startup and immutable
/// afterwards.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    /// Endpoint base URL. Absent or empty disables cloud delivery.
    pub base_url: Option<String>,
    /// Function key. Transmitted as the `code` query parameter, never as a
    /// header, for endpoints that only accept query-based keys.
    pub function_key: Option<String>,
    /// Server-side site route.
    pub website_id: String,
    /// Server-side camera route.
    pub camera_name: String,
    pub content_type: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            function_key: None,
            website_id: "default".to_string(),
            camera_name: "camera1".to_string(),
            content_type: "image/jpeg".to_string(),
        }
    }
}

/// Outcome of one upload attempt. Never persisted.
#[derive(Clone, Debug)]
pub struct UploadResult {
    pub success: bool,
    /// HTTP status, when a response was received at all.
    pub status: Option<u16>,
    pub error: Option<String>,
}

impl UploadResult {
    fn ok(status: u16) -> Self {
        Self {
            success: true,
            status: Some(status),
            error: None,
        }
    }

    fn failed_status(status: u16, body: String) -> Self {
        Self {
            success: false,
            status: Some(status),
            error: Some(format!("status {}, body: {}", status, body)),
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            status: None,
            error: Some(error),
        }
    }
}

/// HTTP PUT uploader for captured stills.
pub struct CloudUploader {
    target: Option<Url>,
    agent: ureq::Agent,
    content_type: String,
}

impl CloudUploader {
    /// Build the target URL once; a malformed base URL fails here rather
    /// than on the first trigger.
    pub fn new(config: UploadConfig) -> Result<Self> {
        let target = match config.base_url.as_deref().filter(|base| !base.is_empty()) {
            Some(base) => {
                let mut url = Url::parse(&format!(
                    "{}{}",
                    base.trim_end_matches('/'),
                    UPLOAD_RESOURCE_PATH
                ))
                .with_context(|| format!("parse upload base url '{}'", base))?;
                url.query_pairs_mut()
                    .append_pair("websiteId", &config.website_id)
                    .append_pair("cameraName", &config.camera_name);
                if let Some(key) = config.function_key.as_deref().filter(|key| !key.is_empty()) {
                    url.query_pairs_mut().append_pair("code", key);
                }
                Some(url)
            }
            None => None,
        };
        let agent = ureq::AgentBuilder::new().timeout(UPLOAD_TIMEOUT).build();
        Ok(Self {
            target,
            agent,
            content_type: config.content_type,
        })
    }

    /// Whether an endpoint is configured at all.
    pub fn is_configured(&self) -> bool {
        self.target.is_some()
    }

    /// The resolved target URL, if cloud delivery is enabled.
    pub fn endpoint(&self) -> Option<&Url> {
        self.target.as_ref()
    }

    /// Deliver the artifact at `path`. `timestamp` is a log/correlation
    /// token only. Failures come back as results, never as Err or panics.
    pub fn upload(&self, path: &Path, timestamp: &str) -> UploadResult {
        let Some(url) = &self.target else {
            log::info!("BASE_URL not configured; skipping upload");
            return UploadResult::failed("no endpoint configured".to_string());
        };

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::error!("failed to read artifact {}: {}", path.display(), err);
                return UploadResult::failed(format!("read artifact: {}", err));
            }
        };

        match self
            .agent
            .request_url("PUT", url)
            .set("Content-Type", &self.content_type)
            .send_bytes(&bytes)
        {
            Ok(response) => {
                let status = response.status();
                log::info!("Uploaded photo {} -> {} (status {})", timestamp, url, status);
                UploadResult::ok(status)
            }
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                log::warn!("Upload failed: status {}, body: {}", status, body);
                UploadResult::failed_status(status, body)
            }
            Err(ureq::Error::Transport(transport)) => {
                log::warn!("HTTP upload error: {}", transport);
                UploadResult::failed(transport.to_string())
            }
        }
    }
}
