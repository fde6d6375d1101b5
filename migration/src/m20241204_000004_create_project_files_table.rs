use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProjectFiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProjectFiles::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProjectFiles::ProjectId).uuid().not_null())
                    .col(ColumnDef::new(ProjectFiles::FileName).string().not_null())
                    .col(ColumnDef::new(ProjectFiles::FilePath).string().not_null())
                    .col(ColumnDef::new(ProjectFiles::FileType).string().not_null())
                    .col(ColumnDef::new(ProjectFiles::FileSize).big_integer().not_null())
                    .col(ColumnDef::new(ProjectFiles::MimeType).string().not_null())
                    .col(ColumnDef::new(ProjectFiles::IsInput).boolean().not_null())
                    .col(ColumnDef::new(ProjectFiles::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_project_files_project_id")
                            .from(ProjectFiles::Table, ProjectFiles::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // latest-wins lookups filter on all three and sort by created_at
        manager
            .create_index(
                Index::create()
                    .name("idx_project_files_lookup")
                    .table(ProjectFiles::Table)
                    .col(ProjectFiles::ProjectId)
                    .col(ProjectFiles::FileType)
                    .col(ProjectFiles::IsInput)
                    .col(ProjectFiles::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProjectFiles::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProjectFiles {
    Table,
    Id,
    ProjectId,
    FileName,
    FilePath,
    FileType,
    FileSize,
    MimeType,
    IsInput,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Projects {
    Table,
    Id,
}
