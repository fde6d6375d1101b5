use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub project_type: ProjectType,
    pub status: ProjectStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub user_prompt: Option<String>,
    pub parent_project_id: Option<Uuid>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(
    EnumIter, DeriveActiveEnum, Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectType {
    #[sea_orm(string_value = "IMAGE_TO_3D")]
    #[serde(rename = "IMAGE_TO_3D")]
    ImageTo3d,
    #[sea_orm(string_value = "MODEL_TO_SKELETON")]
    ModelToSkeleton,
}

#[derive(
    EnumIter, DeriveActiveEnum, Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    #[sea_orm(string_value = "CREATED")]
    Created,
    #[sea_orm(string_value = "PROCESSING")]
    Processing,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

impl ProjectStatus {
    /// Coarse progress estimate for pollers; nothing is tracked incrementally.
    pub fn progress(self) -> u8 {
        match self {
            ProjectStatus::Processing => 50,
            ProjectStatus::Completed => 100,
            ProjectStatus::Created | ProjectStatus::Failed => 0,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(has_many = "super::project_file::Entity")]
    ProjectFile,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::project_file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectFile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    /// Ownership-scoped lookup. A project owned by someone else is indistinguishable
    /// from a missing one.
    pub fn find_owned(id: Uuid, owner_id: Uuid) -> Select<Entity> {
        Self::find_by_id(id).filter(Column::OwnerId.eq(owner_id))
    }
}
