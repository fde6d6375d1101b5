use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ProcessingError;
use crate::models::params::{ImageTo3dParams, SkeletonParams};

/// HTTP client for the AI proxy that fronts the reconstruction and rigging models.
#[derive(Clone)]
pub struct ProxyClient {
    http: Client,
    base_url: Url,
}

impl Debug for ProxyClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ProxyClient")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

#[derive(Debug, Serialize)]
pub struct ImageTo3dRequest<'a> {
    pub image_name: &'a str,
    pub image_content: &'a str,
    pub seed: i64,
    pub ss_guidance_strength: f64,
    pub ss_sampling_steps: u32,
    pub slat_guidance_strength: f64,
    pub slat_sampling_steps: u32,
    pub mesh_simplify: f64,
    pub texture_size: u32,
}

impl<'a> ImageTo3dRequest<'a> {
    pub fn new(image_name: &'a str, image_content: &'a str, params: &ImageTo3dParams) -> Self {
        Self {
            image_name,
            image_content,
            seed: params.seed,
            ss_guidance_strength: params.ss_guidance_strength,
            ss_sampling_steps: params.ss_sampling_steps,
            slat_guidance_strength: params.slat_guidance_strength,
            slat_sampling_steps: params.slat_sampling_steps,
            mesh_simplify: params.mesh_simplify,
            texture_size: params.texture_size,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SkeletonRequest<'a> {
    pub file_name: &'a str,
    pub file_content: &'a str,
    pub text_prompt: &'a str,
    pub confidence: f64,
    pub preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_params: Option<serde_json::Value>,
}

impl<'a> SkeletonRequest<'a> {
    pub fn new(file_name: &'a str, file_content: &'a str, params: &'a SkeletonParams) -> Self {
        Self {
            file_name,
            file_content,
            text_prompt: &params.text_prompt,
            confidence: params.confidence,
            preview: params.preview,
            extra_params: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ImageTo3dResponse {
    pub success: bool,
    #[serde(default)]
    pub files: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SkeletonResponse {
    pub success: bool,
    #[serde(default)]
    pub file_contents: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub file_names: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ProxyHealth {
    #[serde(default)]
    pub status: Option<String>,
    pub connected_to_space: bool,
    #[serde(default)]
    pub space_name: String,
    #[serde(default)]
    pub uptime: f64,
}

fn rejection(error_message: Option<String>, error: Option<String>) -> ProcessingError {
    ProcessingError::ProxyRejected(
        error_message
            .or(error)
            .unwrap_or_else(|| "unknown error".to_string()),
    )
}

impl ImageTo3dResponse {
    /// Turns `success: false` into an error and hands back the output files.
    pub fn into_files(self) -> Result<BTreeMap<String, String>, ProcessingError> {
        if !self.success {
            return Err(rejection(self.error_message, self.error));
        }
        Ok(self.files.unwrap_or_default())
    }
}

impl SkeletonResponse {
    pub fn ensure_success(self) -> Result<Self, ProcessingError> {
        if !self.success {
            return Err(rejection(self.error_message, self.error));
        }
        Ok(self)
    }
}

impl ProxyClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("invalid AI proxy URL: {base_url}"))?;
        // Url::join replaces the last segment unless the path ends with a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for the AI proxy")?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProcessingError> {
        self.base_url
            .join(path)
            .map_err(|e| ProcessingError::Internal(format!("invalid proxy endpoint {path}: {e}")))
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ProcessingError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // FastAPI errors come back as {"detail": ...}
            let detail = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("error_message")
                        .or_else(|| v.get("detail"))
                        .map(|d| d.as_str().map(str::to_string).unwrap_or_else(|| d.to_string()))
                })
                .unwrap_or(body);
            return Err(ProcessingError::ProxyRejected(format!(
                "proxy returned {status}: {detail}"
            )));
        }
        Ok(response.json().await?)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProcessingError> {
        let url = self.endpoint(path)?;
        tracing::debug!(%url, "calling AI proxy");
        let response = self.http.post(url).json(body).send().await?;
        Self::read_json(response).await
    }

    pub async fn image_to_3d(
        &self,
        request: &ImageTo3dRequest<'_>,
    ) -> Result<ImageTo3dResponse, ProcessingError> {
        self.post_json("image-to-3d", request).await
    }

    pub async fn model_to_skeleton(
        &self,
        request: &SkeletonRequest<'_>,
    ) -> Result<SkeletonResponse, ProcessingError> {
        self.post_json("model-to-skeleton", request).await
    }

    /// Streaming `/process` endpoint used by the single-shot upload flow.
    pub async fn process(
        &self,
        request: &SkeletonRequest<'_>,
    ) -> Result<SkeletonResponse, ProcessingError> {
        self.post_json("process", request).await
    }

    pub async fn health(&self) -> Result<ProxyHealth, ProcessingError> {
        let response = self.http.get(self.endpoint("health")?).send().await?;
        Self::read_json(response).await
    }

    pub async fn reconnect(&self) -> Result<serde_json::Value, ProcessingError> {
        let response = self.http.post(self.endpoint("reconnect")?).send().await?;
        Self::read_json(response).await
    }
}
