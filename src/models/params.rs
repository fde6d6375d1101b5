use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Reconstruction parameters forwarded to the proxy's `/image-to-3d`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageTo3dParams {
    #[serde(default)]
    pub seed: i64,
    #[serde(default = "default_ss_guidance_strength")]
    pub ss_guidance_strength: f64,
    #[serde(default = "default_sampling_steps")]
    pub ss_sampling_steps: u32,
    #[serde(default = "default_slat_guidance_strength")]
    pub slat_guidance_strength: f64,
    #[serde(default = "default_sampling_steps")]
    pub slat_sampling_steps: u32,
    #[serde(default = "default_mesh_simplify")]
    pub mesh_simplify: f64,
    #[serde(default = "default_texture_size")]
    pub texture_size: u32,
}

fn default_ss_guidance_strength() -> f64 {
    7.5
}

fn default_sampling_steps() -> u32 {
    12
}

fn default_slat_guidance_strength() -> f64 {
    3.0
}

fn default_mesh_simplify() -> f64 {
    0.95
}

fn default_texture_size() -> u32 {
    1024
}

impl Default for ImageTo3dParams {
    fn default() -> Self {
        Self {
            seed: 0,
            ss_guidance_strength: default_ss_guidance_strength(),
            ss_sampling_steps: default_sampling_steps(),
            slat_guidance_strength: default_slat_guidance_strength(),
            slat_sampling_steps: default_sampling_steps(),
            mesh_simplify: default_mesh_simplify(),
            texture_size: default_texture_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessImageRequest {
    pub image_name: String,
    /// Base64 encoded image bytes.
    pub image_content: String,
    #[serde(flatten)]
    pub params: ImageTo3dParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelSource {
    Upload,
    ExistingProject,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkeletonParams {
    #[serde(default)]
    pub text_prompt: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_preview")]
    pub preview: bool,
}

fn default_confidence() -> f64 {
    0.8
}

fn default_preview() -> bool {
    true
}

impl Default for SkeletonParams {
    fn default() -> Self {
        Self {
            text_prompt: String::new(),
            confidence: default_confidence(),
            preview: default_preview(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessModelRequest {
    pub model_source: ModelSource,
    pub model_name: Option<String>,
    /// Base64 encoded model bytes, required for `UPLOAD`.
    pub model_content: Option<String>,
    /// Required for `EXISTING_PROJECT`.
    #[schema(value_type = Option<String>)]
    pub parent_project_id: Option<Uuid>,
    #[serde(flatten)]
    pub params: SkeletonParams,
}

/// Acknowledgement returned by both submit endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub status: crate::entities::project::ProjectStatus,
    #[schema(value_type = String)]
    pub project_id: Uuid,
}
