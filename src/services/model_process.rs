//! Single-shot upload flow: one model file in, a skeleton bundle out, no project.

use std::path::Path;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, Set,
};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::model_process::{self, Entity as ModelProcess, ProcessStatus};
use crate::entities::processing_file::{self, ProcessingFileType};
use crate::error::{AppError, ProcessingError};
use crate::models::file_type;
use crate::models::params::SkeletonParams;
use crate::services::job::JobHandle;
use crate::services::proxy::{ProxyClient, SkeletonRequest};
use crate::services::storage::FileStore;
use crate::utils::payload::{decode_base64, encode_base64};

const DEFAULT_DOWNLOAD_FORMAT: &str = "zip";
const UNREACHABLE_MESSAGE: &str = "AI processing service unreachable, please retry later";

#[derive(Debug, Clone)]
pub struct ModelProcessService {
    db: DatabaseConnection,
    uploads: FileStore,
    results: FileStore,
    proxy: ProxyClient,
}

/// An accepted upload, already checked against the extension filter.
#[derive(Debug)]
pub struct UploadedModel {
    pub original_filename: String,
    pub bytes: Vec<u8>,
    pub user_prompt: String,
    pub template_id: String,
    pub prompt_weight: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelProcessStatus {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub status: ProcessStatus,
    pub progress: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<model_process::Model> for ModelProcessStatus {
    fn from(record: model_process::Model) -> Self {
        let result_url = (record.status == ProcessStatus::Completed && record.result_path.is_some())
            .then(|| format!("/models/{}/download", record.id));
        Self {
            id: record.id,
            status: record.status,
            progress: record.progress,
            result_url,
            error: record.error,
        }
    }
}

/// A result file ready to be streamed.
#[derive(Debug, Clone)]
pub struct ResultFile {
    pub relative_path: String,
    pub file_name: String,
    pub mime_type: &'static str,
}

/// Friendly text for transport failures, the display text otherwise.
fn failure_message(error: &ProcessingError) -> String {
    match error {
        ProcessingError::Proxy(e) if e.is_connect() || e.is_timeout() => {
            UNREACHABLE_MESSAGE.to_string()
        }
        other => format!("Processing failed: {other}"),
    }
}

/// Keeps a proxy-suggested name only if it is a plain file name.
fn suggested_name(suggested: Option<&String>, tag: &str) -> String {
    suggested
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty() && *name != "..")
        .map(str::to_string)
        .unwrap_or_else(|| format!("output.{tag}"))
}

impl ModelProcessService {
    pub fn new(db: DatabaseConnection, uploads: FileStore, results: FileStore, proxy: ProxyClient) -> Self {
        Self {
            db,
            uploads,
            results,
            proxy,
        }
    }

    pub fn results(&self) -> &FileStore {
        &self.results
    }

    /// Stores the upload, records a `processing` run and starts the continuation.
    pub async fn upload(
        &self,
        owner: Uuid,
        upload: UploadedModel,
    ) -> Result<(model_process::Model, JobHandle), AppError> {
        let ext = file_type::extension_of(&upload.original_filename)
            .filter(|ext| file_type::is_model_extension(ext))
            .ok_or_else(|| AppError::BadRequest("Unsupported model file format".to_string()))?;

        let id = Uuid::new_v4();
        let stored_name = format!("{id}.{ext}");
        self.uploads.write(".", &stored_name, &upload.bytes).await?;

        let now = chrono::Utc::now().naive_utc();
        let record = model_process::ActiveModel {
            id: Set(id),
            owner_id: Set(owner),
            original_filename: Set(upload.original_filename),
            file_path: Set(stored_name),
            user_prompt: Set(upload.user_prompt),
            template_id: Set(upload.template_id),
            prompt_weight: Set(upload.prompt_weight),
            status: Set(ProcessStatus::Processing),
            progress: Set(0),
            result_path: Set(None),
            result_filename: Set(None),
            error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        tracing::info!(model_id = %id, file = %record.original_filename, "model upload accepted");

        let this = self.clone();
        let run = record.clone();
        let finisher = self.clone();
        let handle = JobHandle::spawn(
            id,
            async move { this.run(run).await },
            move |outcome| async move { finisher.finish(id, outcome).await },
        );
        Ok((record, handle))
    }

    async fn find_owned(&self, owner: Uuid, id: Uuid) -> Result<model_process::Model, AppError> {
        ModelProcess::find_by_id(id)
            .filter(model_process::Column::OwnerId.eq(owner))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Processing task not found".to_string()))
    }

    pub async fn status(&self, owner: Uuid, id: Uuid) -> Result<ModelProcessStatus, AppError> {
        Ok(self.find_owned(owner, id).await?.into())
    }

    /// Resolves the result file of a completed run for `format` (`obj`, `json`, ...).
    /// Without a format the zip bundle is served.
    pub async fn result_file(
        &self,
        owner: Uuid,
        id: Uuid,
        format: Option<&str>,
    ) -> Result<ResultFile, AppError> {
        let format = format.unwrap_or(DEFAULT_DOWNLOAD_FORMAT);
        let record = self.find_owned(owner, id).await?;
        if record.status != ProcessStatus::Completed {
            return Err(AppError::NotFound(
                "Processing not finished or result missing".to_string(),
            ));
        }

        let wanted = ProcessingFileType::from_key(format)
            .ok_or_else(|| AppError::NotFound(format!("No {format} result file")))?;
        let file = record
            .find_related(processing_file::Entity)
            .filter(processing_file::Column::FileType.eq(wanted))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No {format} result file")))?;

        if !self.results.exists(&file.file_path).await {
            return Err(AppError::NotFound("Result file missing on disk".to_string()));
        }

        Ok(ResultFile {
            mime_type: file_type::mime_from_file_name(&file.file_name),
            relative_path: file.file_path,
            file_name: file.file_name,
        })
    }

    async fn run(&self, record: model_process::Model) -> Result<(), ProcessingError> {
        self.set_progress(record.id, 10).await?;

        let bytes = self.uploads.read(&record.file_path).await?;
        let content = encode_base64(&bytes);
        let params = SkeletonParams {
            text_prompt: record.user_prompt.clone(),
            ..SkeletonParams::default()
        };
        let mut request = SkeletonRequest::new(&record.file_path, &content, &params);
        request.extra_params = Some(json!({
            "modelId": record.id,
            "templateId": record.template_id,
            "promptWeight": record.prompt_weight,
        }));

        let response = self.proxy.process(&request).await?.ensure_success()?;
        let names = response.file_names.unwrap_or_default();
        let dir = FileStore::project_dir(record.id);

        let mut json_path = None;
        let mut obj_path = None;
        for (tag, encoded) in response.file_contents.unwrap_or_default() {
            if !file_type::is_valid_tag(&tag) {
                return Err(ProcessingError::InvalidFileType(tag));
            }
            let file_name = suggested_name(names.get(&tag), &tag);
            let data = decode_base64(&encoded).ok_or_else(|| ProcessingError::Decode(tag.clone()))?;
            let path = self.results.write(&dir, &file_name, &data).await?;
            tracing::info!(model_id = %record.id, file_type = %tag, path = %path, "result file saved");

            let Some(kind) = ProcessingFileType::from_key(&tag) else {
                continue;
            };
            match kind {
                ProcessingFileType::Json => json_path = Some(path.clone()),
                ProcessingFileType::Obj => obj_path = Some(path.clone()),
                _ => {}
            }
            processing_file::ActiveModel {
                id: Set(Uuid::new_v4()),
                model_process_id: Set(record.id),
                file_type: Set(kind),
                file_path: Set(path),
                file_name: Set(file_name),
                file_size_bytes: Set(data.len() as i64),
                created_at: Set(chrono::Utc::now().naive_utc()),
            }
            .insert(&self.db)
            .await?;
        }

        ModelProcess::update_many()
            .set(model_process::ActiveModel {
                status: Set(ProcessStatus::Completed),
                progress: Set(100),
                result_path: Set(json_path.or(obj_path)),
                result_filename: Set(Some(format!("skeleton_{}.json", record.id))),
                error: Set(None),
                updated_at: Set(chrono::Utc::now().naive_utc()),
                ..Default::default()
            })
            .filter(model_process::Column::Id.eq(record.id))
            .filter(model_process::Column::Status.eq(ProcessStatus::Processing))
            .exec(&self.db)
            .await?;
        tracing::info!(model_id = %record.id, "model processing completed");
        Ok(())
    }

    async fn set_progress(&self, id: Uuid, progress: i32) -> Result<(), ProcessingError> {
        ModelProcess::update_many()
            .set(model_process::ActiveModel {
                progress: Set(progress),
                updated_at: Set(chrono::Utc::now().naive_utc()),
                ..Default::default()
            })
            .filter(model_process::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn finish(&self, id: Uuid, outcome: Result<(), ProcessingError>) {
        let Err(error) = outcome else {
            return;
        };
        tracing::error!(model_id = %id, error = %error, "model processing failed");

        let result = ModelProcess::update_many()
            .set(model_process::ActiveModel {
                status: Set(ProcessStatus::Failed),
                progress: Set(0),
                error: Set(Some(failure_message(&error))),
                updated_at: Set(chrono::Utc::now().naive_utc()),
                ..Default::default()
            })
            .filter(model_process::Column::Id.eq(id))
            .filter(model_process::Column::Status.eq(ProcessStatus::Processing))
            .exec(&self.db)
            .await;
        if let Err(e) = result {
            tracing::error!(model_id = %id, error = %e, "failed to record model failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggested_names_are_sanitised() {
        let evil = "../../etc/passwd".to_string();
        assert_eq!(suggested_name(Some(&evil), "txt"), "passwd");
        assert_eq!(suggested_name(None, "obj"), "output.obj");
        let fine = "rig.json".to_string();
        assert_eq!(suggested_name(Some(&fine), "json"), "rig.json");
    }

    #[test]
    fn non_transport_failures_keep_their_text() {
        let msg = failure_message(&ProcessingError::ProxyRejected("space asleep".into()));
        assert_eq!(msg, "Processing failed: AI processing failed: space asleep");
    }
}
