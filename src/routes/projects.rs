use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Json, Response},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::entities::project::{self, Entity as Project, ProjectStatus, ProjectType};
use crate::entities::project_file::{self, Entity as ProjectFile};
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::models::file_type;
use crate::models::params::{ProcessImageRequest, ProcessModelRequest, SubmitResponse};
use crate::pagination::{PaginatedResponse, Pagination};
use crate::services::workflow::ProjectStatusView;
use crate::AppState;

#[derive(Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    name: String,
    description: Option<String>,
    #[serde(rename = "type")]
    project_type: ProjectType,
    user_prompt: Option<String>,
    #[schema(value_type = Option<String>)]
    parent_project_id: Option<Uuid>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResponse {
    #[schema(value_type = String)]
    id: Uuid,
    name: String,
    description: Option<String>,
    #[serde(rename = "type")]
    project_type: ProjectType,
    status: ProjectStatus,
    user_prompt: Option<String>,
    #[schema(value_type = Option<String>)]
    parent_project_id: Option<Uuid>,
    error_message: Option<String>,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
}

impl From<project::Model> for ProjectResponse {
    fn from(project: project::Model) -> Self {
        ProjectResponse {
            id: project.id,
            name: project.name,
            description: project.description,
            project_type: project.project_type,
            status: project.status,
            user_prompt: project.user_prompt,
            parent_project_id: project.parent_project_id,
            error_message: project.error_message,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFileResponse {
    #[schema(value_type = String)]
    id: Uuid,
    file_name: String,
    file_type: String,
    file_size: i64,
    mime_type: String,
    is_input: bool,
    created_at: chrono::NaiveDateTime,
}

impl From<project_file::Model> for ProjectFileResponse {
    fn from(file: project_file::Model) -> Self {
        ProjectFileResponse {
            id: file.id,
            file_name: file.file_name,
            file_type: file.file_type,
            file_size: file.file_size,
            mime_type: file.mime_type,
            is_input: file.is_input,
            created_at: file.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetailResponse {
    #[serde(flatten)]
    project: ProjectResponse,
    files: Vec<ProjectFileResponse>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelFileResponse {
    #[schema(value_type = String)]
    id: Uuid,
    #[schema(value_type = String)]
    project_id: Uuid,
    project_name: String,
    file_name: String,
    file_type: String,
    created_at: chrono::NaiveDateTime,
}

#[utoipa::path(
    post,
    path = "/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = ProjectResponse),
        (status = 400, description = "Invalid project name"),
        (status = 404, description = "Parent project not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Projects"
)]
pub async fn create_project(
    State(db): State<DatabaseConnection>,
    auth_user: axum::Extension<AuthUser>,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>), AppError> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("Project name is required".to_string()));
    }

    if let Some(parent_id) = payload.parent_project_id {
        Project::find_owned(parent_id, auth_user.id)
            .one(&db)
            .await?
            .ok_or_else(|| AppError::NotFound("Parent project not found".to_string()))?;
    }

    let now = chrono::Utc::now().naive_utc();
    let project = project::ActiveModel {
        id: Set(Uuid::new_v4()),
        owner_id: Set(auth_user.id),
        name: Set(name),
        description: Set(payload.description),
        project_type: Set(payload.project_type),
        status: Set(ProjectStatus::Created),
        user_prompt: Set(payload.user_prompt),
        parent_project_id: Set(payload.parent_project_id),
        error_message: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&db)
    .await?;

    tracing::info!(project_id = %project.id, user = %auth_user.username, project_type = ?project.project_type, "project created");
    Ok((StatusCode::CREATED, Json(ProjectResponse::from(project))))
}

#[utoipa::path(
    get,
    path = "/projects",
    params(
        Pagination
    ),
    responses(
        (status = 200, description = "Caller's projects, newest first", body = PaginatedResponse<ProjectResponse>)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Projects"
)]
pub async fn list_projects(
    State(db): State<DatabaseConnection>,
    auth_user: axum::Extension<AuthUser>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<ProjectResponse>>, AppError> {
    let query = Project::find().filter(project::Column::OwnerId.eq(auth_user.id));
    let total = query.clone().count(&db).await?;

    let projects = query
        .order_by_desc(project::Column::CreatedAt)
        .limit(pagination.limit())
        .offset(pagination.offset())
        .all(&db)
        .await?;

    let data = projects.into_iter().map(ProjectResponse::from).collect();
    Ok(Json(PaginatedResponse::new(
        data,
        total,
        pagination.page(),
        pagination.limit(),
    )))
}

#[utoipa::path(
    get,
    path = "/projects/model-files",
    responses(
        (status = 200, description = "Generated models usable as rigging input", body = [ModelFileResponse])
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Projects"
)]
pub async fn list_model_files(
    State(db): State<DatabaseConnection>,
    auth_user: axum::Extension<AuthUser>,
) -> Result<Json<Vec<ModelFileResponse>>, AppError> {
    let rows = ProjectFile::find()
        .find_also_related(Project)
        .filter(project::Column::OwnerId.eq(auth_user.id))
        .filter(project::Column::ProjectType.eq(ProjectType::ImageTo3d))
        .filter(project::Column::Status.eq(ProjectStatus::Completed))
        .filter(project_file::Column::FileType.eq("glb"))
        .filter(project_file::Column::IsInput.eq(false))
        .order_by_desc(project_file::Column::CreatedAt)
        .all(&db)
        .await?;

    let files = rows
        .into_iter()
        .filter_map(|(file, project)| {
            project.map(|project| ModelFileResponse {
                id: file.id,
                project_id: project.id,
                project_name: project.name,
                file_name: file.file_name,
                file_type: file.file_type,
                created_at: file.created_at,
            })
        })
        .collect();
    Ok(Json(files))
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    params(
        ("id" = String, Path, description = "Project ID")
    ),
    responses(
        (status = 200, description = "Project with its files", body = ProjectDetailResponse),
        (status = 404, description = "Project not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Projects"
)]
pub async fn get_project(
    State(state): State<AppState>,
    auth_user: axum::Extension<AuthUser>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ProjectDetailResponse>, AppError> {
    let project = state.workflow.find_owned(auth_user.id, project_id).await?;
    let files = project
        .find_related(ProjectFile)
        .order_by_asc(project_file::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(ProjectDetailResponse {
        project: project.into(),
        files: files.into_iter().map(ProjectFileResponse::from).collect(),
    }))
}

#[utoipa::path(
    delete,
    path = "/projects/{id}",
    params(
        ("id" = String, Path, description = "Project ID")
    ),
    responses(
        (status = 200, description = "Project and its files deleted"),
        (status = 404, description = "Project not found"),
        (status = 409, description = "Project is processing")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Projects"
)]
pub async fn delete_project(
    State(state): State<AppState>,
    auth_user: axum::Extension<AuthUser>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let removed = state.workflow.delete(auth_user.id, project_id).await?;

    tracing::info!(project_id = %project_id, user = %auth_user.username, files = removed, "project deleted");
    Ok(Json(serde_json::json!({
        "message": "Project deleted successfully"
    })))
}

#[utoipa::path(
    get,
    path = "/projects/{id}/status",
    params(
        ("id" = String, Path, description = "Project ID")
    ),
    responses(
        (status = 200, description = "Current processing status", body = ProjectStatusView),
        (status = 404, description = "Project not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Projects"
)]
pub async fn project_status(
    State(state): State<AppState>,
    auth_user: axum::Extension<AuthUser>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ProjectStatusView>, AppError> {
    Ok(Json(state.workflow.status(auth_user.id, project_id).await?))
}

#[utoipa::path(
    post,
    path = "/projects/{id}/process-image",
    params(
        ("id" = String, Path, description = "IMAGE_TO_3D project ID")
    ),
    request_body = ProcessImageRequest,
    responses(
        (status = 202, description = "Processing started", body = SubmitResponse),
        (status = 400, description = "Missing or invalid image"),
        (status = 404, description = "Project not found or type mismatch"),
        (status = 409, description = "Project is already processing")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Projects"
)]
pub async fn process_image(
    State(state): State<AppState>,
    auth_user: axum::Extension<AuthUser>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<ProcessImageRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    state
        .workflow
        .submit_image(auth_user.id, project_id, payload)
        .await?
        .detach();

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            status: ProjectStatus::Processing,
            project_id,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/projects/{id}/process-model",
    params(
        ("id" = String, Path, description = "MODEL_TO_SKELETON project ID")
    ),
    request_body = ProcessModelRequest,
    responses(
        (status = 202, description = "Processing started", body = SubmitResponse),
        (status = 400, description = "Missing model content or parent project id"),
        (status = 404, description = "Project or parent model not found"),
        (status = 409, description = "Project is already processing")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Projects"
)]
pub async fn process_model(
    State(state): State<AppState>,
    auth_user: axum::Extension<AuthUser>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<ProcessModelRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    state
        .workflow
        .submit_model(auth_user.id, project_id, payload)
        .await?
        .detach();

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            status: ProjectStatus::Processing,
            project_id,
        }),
    ))
}

/// Streams a stored file with the given content type and disposition.
pub(crate) async fn stream_file(
    store: &crate::services::storage::FileStore,
    relative_path: &str,
    file_name: &str,
    mime_type: &str,
    disposition: &str,
) -> Result<Response, AppError> {
    let file = store.open(relative_path).await.map_err(|e| {
        tracing::warn!(path = %relative_path, error = %e, "stored file unavailable");
        AppError::NotFound("File not found on disk".to_string())
    })?;
    let length = file.metadata().await?.len();
    let safe_name = file_name.replace(['"', '\\', '\r', '\n'], "_");

    Response::builder()
        .header(header::CONTENT_TYPE, mime_type)
        .header(header::CONTENT_LENGTH, length)
        .header(
            header::CONTENT_DISPOSITION,
            format!("{disposition}; filename=\"{safe_name}\""),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::InternalServerError(e.to_string()))
}

#[utoipa::path(
    get,
    path = "/projects/{id}/download/{file_type}",
    params(
        ("id" = String, Path, description = "Project ID"),
        ("file_type" = String, Path, description = "input_image, input_model, glb, obj, json, txt, zip or preview_video"),
        ("token" = Option<String>, Query, description = "JWT for links that cannot send headers")
    ),
    responses(
        (status = 200, description = "Latest file of that type", content_type = "application/octet-stream"),
        (status = 404, description = "Project or file not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Projects"
)]
pub async fn download_file(
    State(state): State<AppState>,
    auth_user: axum::Extension<AuthUser>,
    Path((project_id, kind)): Path<(Uuid, String)>,
) -> Result<Response, AppError> {
    let project = state.workflow.find_owned(auth_user.id, project_id).await?;
    let file = state
        .workflow
        .files()
        .latest(project.id, &kind)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No {kind} file for this project")))?;

    let mime_type = file_type::mime_type_for(&file.file_type, &file.file_name);
    stream_file(
        state.workflow.files().store(),
        &file.file_path,
        &file.file_name,
        mime_type,
        "inline",
    )
    .await
}
