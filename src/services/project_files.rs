use std::collections::BTreeMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::project_file::{self, Entity as ProjectFile};
use crate::error::ProcessingError;
use crate::models::file_type;
use crate::services::storage::FileStore;
use crate::utils::payload::decode_base64;

/// Persists project artifacts on disk and records a row for each one.
#[derive(Debug, Clone)]
pub struct ProjectFileService {
    db: DatabaseConnection,
    store: FileStore,
}

impl ProjectFileService {
    pub fn new(db: DatabaseConnection, store: FileStore) -> Self {
        Self { db, store }
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Decodes and writes every `tag -> base64` entry into today's project directory.
    ///
    /// Entries are processed in map order. The first failure stops the run; files
    /// written before it stay in place.
    pub async fn save_files(
        &self,
        project_id: Uuid,
        files: &BTreeMap<String, String>,
        is_input: bool,
        original_name: Option<&str>,
    ) -> Result<Vec<project_file::Model>, ProcessingError> {
        let dir = FileStore::project_dir(project_id);
        let mut saved = Vec::with_capacity(files.len());

        for (tag, content) in files {
            let (file_name, mime_type) = file_type::describe(tag, original_name)?;
            let bytes = decode_base64(content).ok_or_else(|| ProcessingError::Decode(tag.clone()))?;
            let file_path = self.store.write(&dir, &file_name, &bytes).await?;

            let row = project_file::ActiveModel {
                id: Set(Uuid::new_v4()),
                project_id: Set(project_id),
                file_name: Set(file_name),
                file_path: Set(file_path),
                file_type: Set(tag.clone()),
                file_size: Set(bytes.len() as i64),
                mime_type: Set(mime_type.to_string()),
                is_input: Set(is_input),
                created_at: Set(chrono::Utc::now().naive_utc()),
            }
            .insert(&self.db)
            .await?;

            tracing::info!(
                project_id = %project_id,
                file_type = %tag,
                size = row.file_size,
                path = %row.file_path,
                "project file saved"
            );
            saved.push(row);
        }

        Ok(saved)
    }

    /// Most recent row for `(project, type)`. Whether the row is an input is implied
    /// by the type.
    pub async fn latest(
        &self,
        project_id: Uuid,
        file_type: &str,
    ) -> Result<Option<project_file::Model>, DbErr> {
        ProjectFile::find()
            .filter(project_file::Column::ProjectId.eq(project_id))
            .filter(project_file::Column::FileType.eq(file_type))
            .filter(project_file::Column::IsInput.eq(file_type::is_input_type(file_type)))
            .order_by_desc(project_file::Column::CreatedAt)
            .one(&self.db)
            .await
    }

    pub async fn list(&self, project_id: Uuid) -> Result<Vec<project_file::Model>, DbErr> {
        ProjectFile::find()
            .filter(project_file::Column::ProjectId.eq(project_id))
            .order_by_asc(project_file::Column::CreatedAt)
            .all(&self.db)
            .await
    }

    /// Removes the given files of a project from disk, then every file row of the
    /// project. Disk failures are logged and do not stop the delete.
    pub async fn delete_all(
        &self,
        project_id: Uuid,
        files: &[project_file::Model],
    ) -> Result<u64, DbErr> {
        for file in files {
            if let Err(e) = self.store.remove(&file.file_path).await {
                tracing::warn!(
                    project_id = %project_id,
                    path = %file.file_path,
                    error = %e,
                    "failed to remove project file from disk"
                );
            }
        }

        let result = ProjectFile::delete_many()
            .filter(project_file::Column::ProjectId.eq(project_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
