//! Project processing workflow.
//!
//! A submission flips the project to `PROCESSING` synchronously and hands the rest of
//! the work to a spawned continuation. The continuation is the only writer of the
//! terminal status, and it writes it exactly once.

use std::collections::BTreeMap;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::project::{self, Entity as Project, ProjectStatus, ProjectType};
use crate::error::{AppError, ProcessingError};
use crate::models::file_type::{INPUT_IMAGE, INPUT_MODEL};
use crate::models::params::{
    ImageTo3dParams, ModelSource, ProcessImageRequest, ProcessModelRequest, SkeletonParams,
};
use crate::services::job::JobHandle;
use crate::services::project_files::ProjectFileService;
use crate::services::proxy::{ImageTo3dRequest, ProxyClient, SkeletonRequest};
use crate::utils::payload::{encode_base64, validate_image_payload, validate_model_payload};

const PARENT_MODEL_TYPE: &str = "glb";

#[derive(Debug, Clone)]
pub struct ProjectWorkflow {
    db: DatabaseConnection,
    files: ProjectFileService,
    proxy: ProxyClient,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatusView {
    pub status: ProjectStatus,
    pub progress: u8,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    pub name: String,
    pub created_at: chrono::NaiveDateTime,
    pub error_message: Option<String>,
}

impl From<project::Model> for ProjectStatusView {
    fn from(project: project::Model) -> Self {
        Self {
            status: project.status,
            progress: project.status.progress(),
            project_type: project.project_type,
            name: project.name,
            created_at: project.created_at,
            error_message: project.error_message,
        }
    }
}

/// Everything an image-to-3D continuation needs, owned.
struct ImageJob {
    image_name: String,
    image_content: String,
    params: ImageTo3dParams,
}

/// Everything a model-to-skeleton continuation needs, owned.
struct SkeletonJob {
    model_name: String,
    model_content: String,
    parent_project_id: Option<Uuid>,
    params: SkeletonParams,
}

impl ProjectWorkflow {
    pub fn new(db: DatabaseConnection, files: ProjectFileService, proxy: ProxyClient) -> Self {
        Self { db, files, proxy }
    }

    pub fn files(&self) -> &ProjectFileService {
        &self.files
    }

    /// Loads a project owned by `owner`. Foreign and missing projects both come back
    /// as `NotFound`.
    pub async fn find_owned(&self, owner: Uuid, project_id: Uuid) -> Result<project::Model, AppError> {
        Project::find_owned(project_id, owner)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
    }

    async fn find_owned_of_type(
        &self,
        owner: Uuid,
        project_id: Uuid,
        project_type: ProjectType,
    ) -> Result<project::Model, AppError> {
        let project = self.find_owned(owner, project_id).await?;
        if project.project_type != project_type {
            return Err(AppError::NotFound(
                "Project not found or type mismatch".to_string(),
            ));
        }
        Ok(project)
    }

    pub async fn status(&self, owner: Uuid, project_id: Uuid) -> Result<ProjectStatusView, AppError> {
        Ok(self.find_owned(owner, project_id).await?.into())
    }

    /// Validates the request, marks the project `PROCESSING` and starts the
    /// image-to-3D continuation.
    pub async fn submit_image(
        &self,
        owner: Uuid,
        project_id: Uuid,
        request: ProcessImageRequest,
    ) -> Result<JobHandle, AppError> {
        self.find_owned_of_type(owner, project_id, ProjectType::ImageTo3d).await?;
        if request.image_name.trim().is_empty() {
            return Err(AppError::BadRequest("imageName is required".to_string()));
        }
        let (image_content, format) = validate_image_payload(&request.image_content)?;

        self.begin_processing(project_id).await?;
        tracing::info!(project_id = %project_id, ?format, "image-to-3D submitted");

        let job = ImageJob {
            image_name: request.image_name,
            image_content,
            params: request.params,
        };
        let this = self.clone();
        Ok(self.spawn(project_id, async move { this.run_image(project_id, job).await }))
    }

    /// Resolves the model source, marks the project `PROCESSING` and starts the
    /// model-to-skeleton continuation.
    pub async fn submit_model(
        &self,
        owner: Uuid,
        project_id: Uuid,
        request: ProcessModelRequest,
    ) -> Result<JobHandle, AppError> {
        self.find_owned_of_type(owner, project_id, ProjectType::ModelToSkeleton)
            .await?;

        let (model_name, model_content, parent_project_id) = match request.model_source {
            ModelSource::Upload => {
                let (Some(name), Some(content)) = (request.model_name, request.model_content) else {
                    return Err(AppError::BadRequest(
                        "modelName and modelContent are required for UPLOAD".to_string(),
                    ));
                };
                if name.trim().is_empty() {
                    return Err(AppError::BadRequest("modelName is required".to_string()));
                }
                (name, validate_model_payload(&content)?, None)
            }
            ModelSource::ExistingProject => {
                let parent_id = request.parent_project_id.ok_or_else(|| {
                    AppError::BadRequest(
                        "parentProjectId is required for EXISTING_PROJECT".to_string(),
                    )
                })?;
                let (name, content) = self.load_parent_model(owner, parent_id).await?;
                (name, content, Some(parent_id))
            }
        };

        self.begin_processing(project_id).await?;
        tracing::info!(
            project_id = %project_id,
            source = ?request.model_source,
            parent_project_id = ?parent_project_id,
            "model-to-skeleton submitted"
        );

        let job = SkeletonJob {
            model_name,
            model_content,
            parent_project_id,
            params: request.params,
        };
        let this = self.clone();
        Ok(self.spawn(project_id, async move { this.run_skeleton(project_id, job).await }))
    }

    /// Reads the newest `glb` output of an image-to-3D project owned by `owner`.
    async fn load_parent_model(&self, owner: Uuid, parent_id: Uuid) -> Result<(String, String), AppError> {
        let parent = Project::find_owned(parent_id, owner)
            .filter(project::Column::ProjectType.eq(ProjectType::ImageTo3d))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Parent project not found".to_string()))?;

        let glb = self
            .files
            .latest(parent.id, PARENT_MODEL_TYPE)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("Parent project has no generated 3D model".to_string())
            })?;

        let bytes = self.files.store().read(&glb.file_path).await.map_err(|e| {
            tracing::warn!(parent_project_id = %parent_id, path = %glb.file_path, error = %e, "parent model unreadable");
            AppError::BadRequest("Failed to read parent project model file".to_string())
        })?;

        Ok((glb.file_name, encode_base64(&bytes)))
    }

    /// Deletes an idle project together with its files and returns how many file rows
    /// went with it. Refused while a run is in flight, because the continuation keeps
    /// writing into the project directory until it finishes.
    pub async fn delete(&self, owner: Uuid, project_id: Uuid) -> Result<u64, AppError> {
        let project = self.find_owned(owner, project_id).await?;
        // Listed before the row goes: file rows cascade with the project.
        let files = self.files.list(project.id).await?;

        let result = Project::delete_many()
            .filter(project::Column::Id.eq(project.id))
            .filter(project::Column::Status.ne(ProjectStatus::Processing))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::Conflict(
                "Project is processing, wait for it to finish before deleting".to_string(),
            ));
        }

        self.files.delete_all(project.id, &files).await?;
        Ok(files.len() as u64)
    }

    /// `* -> PROCESSING`, refused while another run is in flight.
    async fn begin_processing(&self, project_id: Uuid) -> Result<(), AppError> {
        let result = Project::update_many()
            .set(project::ActiveModel {
                status: Set(ProjectStatus::Processing),
                error_message: Set(None),
                updated_at: Set(chrono::Utc::now().naive_utc()),
                ..Default::default()
            })
            .filter(project::Column::Id.eq(project_id))
            .filter(project::Column::Status.ne(ProjectStatus::Processing))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::Conflict("Project is already processing".to_string()));
        }
        Ok(())
    }

    fn spawn<F>(&self, project_id: Uuid, work: F) -> JobHandle
    where
        F: std::future::Future<Output = Result<(), ProcessingError>> + Send + 'static,
    {
        let this = self.clone();
        JobHandle::spawn(project_id, work, move |outcome| async move {
            this.finish(project_id, outcome).await
        })
    }

    async fn finish(&self, project_id: Uuid, outcome: Result<(), ProcessingError>) {
        let (status, error_message) = match outcome {
            Ok(()) => (ProjectStatus::Completed, None),
            Err(e) => {
                tracing::error!(project_id = %project_id, error = %e, "project processing failed");
                (ProjectStatus::Failed, Some(e.to_string()))
            }
        };

        let result = Project::update_many()
            .set(project::ActiveModel {
                status: Set(status),
                error_message: Set(error_message),
                updated_at: Set(chrono::Utc::now().naive_utc()),
                ..Default::default()
            })
            .filter(project::Column::Id.eq(project_id))
            .filter(project::Column::Status.eq(ProjectStatus::Processing))
            .exec(&self.db)
            .await;

        match result {
            Ok(r) if r.rows_affected == 1 => {
                tracing::info!(project_id = %project_id, status = ?status, "project finished");
            }
            Ok(_) => {
                tracing::warn!(project_id = %project_id, status = ?status, "project left PROCESSING elsewhere; terminal status not written");
            }
            Err(e) => {
                tracing::error!(project_id = %project_id, status = ?status, error = %e, "failed to record terminal status");
            }
        }
    }

    async fn run_image(&self, project_id: Uuid, job: ImageJob) -> Result<(), ProcessingError> {
        let input = BTreeMap::from([(INPUT_IMAGE.to_string(), job.image_content.clone())]);
        self.files
            .save_files(project_id, &input, true, Some(&job.image_name))
            .await?;

        let request = ImageTo3dRequest::new(&job.image_name, &job.image_content, &job.params);
        let outputs = self.proxy.image_to_3d(&request).await?.into_files()?;
        tracing::info!(
            project_id = %project_id,
            file_types = ?outputs.keys().collect::<Vec<_>>(),
            "image-to-3D proxy call succeeded"
        );

        self.files.save_files(project_id, &outputs, false, None).await?;
        Ok(())
    }

    async fn run_skeleton(&self, project_id: Uuid, job: SkeletonJob) -> Result<(), ProcessingError> {
        if let Some(parent_id) = job.parent_project_id {
            Project::update_many()
                .set(project::ActiveModel {
                    parent_project_id: Set(Some(parent_id)),
                    ..Default::default()
                })
                .filter(project::Column::Id.eq(project_id))
                .exec(&self.db)
                .await?;
        }

        let input = BTreeMap::from([(INPUT_MODEL.to_string(), job.model_content.clone())]);
        self.files
            .save_files(project_id, &input, true, Some(&job.model_name))
            .await?;

        let request = SkeletonRequest::new(&job.model_name, &job.model_content, &job.params);
        let response = self.proxy.model_to_skeleton(&request).await?.ensure_success()?;
        let outputs = response.file_contents.unwrap_or_default();
        tracing::info!(
            project_id = %project_id,
            file_types = ?outputs.keys().collect::<Vec<_>>(),
            "model-to-skeleton proxy call succeeded"
        );

        self.files.save_files(project_id, &outputs, false, None).await?;
        Ok(())
    }
}
