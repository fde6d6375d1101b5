use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "processing_files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub model_process_id: Uuid,
    pub file_type: ProcessingFileType,
    pub file_path: String,
    pub file_name: String,
    pub file_size_bytes: i64,
    pub created_at: DateTime,
}

#[derive(EnumIter, DeriveActiveEnum, Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum ProcessingFileType {
    #[sea_orm(string_value = "OBJ")]
    Obj,
    #[sea_orm(string_value = "TXT")]
    Txt,
    #[sea_orm(string_value = "JSON")]
    Json,
    #[sea_orm(string_value = "ZIP")]
    Zip,
}

impl ProcessingFileType {
    /// Maps a proxy file key (`obj`, `json`, ...) to a recorded kind.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "obj" => Some(Self::Obj),
            "txt" => Some(Self::Txt),
            "json" => Some(Self::Json),
            "zip" => Some(Self::Zip),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::model_process::Entity",
        from = "Column::ModelProcessId",
        to = "super::model_process::Column::Id",
        on_delete = "Cascade"
    )]
    ModelProcess,
}

impl Related<super::model_process::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ModelProcess.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
