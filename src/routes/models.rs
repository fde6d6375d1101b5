use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{Json, Response},
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::model_process::ProcessStatus;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::models::file_type;
use crate::routes::projects::stream_file;
use crate::services::model_process::{ModelProcessStatus, UploadedModel};
use crate::AppState;

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[schema(value_type = String)]
    id: Uuid,
    status: ProcessStatus,
    progress: i32,
    message: String,
}

#[derive(Default)]
struct UploadForm {
    file: Option<(String, Vec<u8>)>,
    user_prompt: Option<String>,
    template_id: Option<String>,
    prompt_weight: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("{field} is required")))
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    let invalid = |e: axum::extract::multipart::MultipartError| {
        AppError::BadRequest(format!("Invalid multipart data: {e}"))
    };

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                // Reject before buffering the body.
                let allowed = file_type::extension_of(&filename)
                    .is_some_and(|ext| file_type::is_model_extension(&ext));
                if !allowed {
                    return Err(AppError::BadRequest(format!(
                        "Unsupported file format, expected one of: {}",
                        file_type::MODEL_EXTENSIONS.join(", ")
                    )));
                }
                let data = field.bytes().await.map_err(invalid)?;
                form.file = Some((filename, data.to_vec()));
            }
            "userPrompt" | "user_prompt" => form.user_prompt = Some(field.text().await.map_err(invalid)?),
            "templateId" | "template_id" => form.template_id = Some(field.text().await.map_err(invalid)?),
            "promptWeight" | "prompt_weight" => {
                form.prompt_weight = Some(field.text().await.map_err(invalid)?)
            }
            _ => {}
        }
    }
    Ok(form)
}

#[utoipa::path(
    post,
    path = "/models/upload",
    request_body(content = Vec<u8>, content_type = "multipart/form-data", description = "file, userPrompt, templateId, promptWeight"),
    responses(
        (status = 202, description = "Upload accepted, processing started", body = UploadResponse),
        (status = 400, description = "Missing field or unsupported model format")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Model Processing"
)]
pub async fn upload_model(
    State(state): State<AppState>,
    auth_user: axum::Extension<AuthUser>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let form = read_form(multipart).await?;
    let (original_filename, bytes) = form
        .file
        .ok_or_else(|| AppError::BadRequest("Please choose a file to upload".to_string()))?;
    let user_prompt = required(form.user_prompt, "userPrompt")?;
    let template_id = required(form.template_id, "templateId")?;
    let prompt_weight: f64 = required(form.prompt_weight, "promptWeight")?
        .parse()
        .map_err(|_| AppError::BadRequest("promptWeight must be a number".to_string()))?;

    let (record, job) = state
        .models
        .upload(
            auth_user.id,
            UploadedModel {
                original_filename,
                bytes,
                user_prompt,
                template_id,
                prompt_weight,
            },
        )
        .await?;
    job.detach();

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            id: record.id,
            status: record.status,
            progress: record.progress,
            message: "File uploaded, processing started".to_string(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/models/{id}/status",
    params(
        ("id" = String, Path, description = "Model process ID")
    ),
    responses(
        (status = 200, description = "Processing status", body = ModelProcessStatus),
        (status = 404, description = "Processing task not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Model Processing"
)]
pub async fn model_status(
    State(state): State<AppState>,
    auth_user: axum::Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ModelProcessStatus>, AppError> {
    Ok(Json(state.models.status(auth_user.id, id).await?))
}

async fn download(state: &AppState, owner: Uuid, id: Uuid, format: Option<&str>) -> Result<Response, AppError> {
    let file = state.models.result_file(owner, id, format).await?;
    stream_file(
        state.models.results(),
        &file.relative_path,
        &file.file_name,
        file.mime_type,
        "attachment",
    )
    .await
}

#[utoipa::path(
    get,
    path = "/models/{id}/download",
    params(
        ("id" = String, Path, description = "Model process ID")
    ),
    responses(
        (status = 200, description = "Zip bundle of all results", content_type = "application/zip"),
        (status = 404, description = "Not finished or no zip result")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Model Processing"
)]
pub async fn download_result(
    State(state): State<AppState>,
    auth_user: axum::Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    download(&state, auth_user.id, id, None).await
}

#[utoipa::path(
    get,
    path = "/models/{id}/download/{format}",
    params(
        ("id" = String, Path, description = "Model process ID"),
        ("format" = String, Path, description = "obj, json, txt or zip")
    ),
    responses(
        (status = 200, description = "Result file", content_type = "application/octet-stream"),
        (status = 404, description = "Not finished or no result in that format")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Model Processing"
)]
pub async fn download_result_by_format(
    State(state): State<AppState>,
    auth_user: axum::Extension<AuthUser>,
    Path((id, format)): Path<(Uuid, String)>,
) -> Result<Response, AppError> {
    download(&state, auth_user.id, id, Some(&format)).await
}
