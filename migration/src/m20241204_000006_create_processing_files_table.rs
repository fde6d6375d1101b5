use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProcessingFiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProcessingFiles::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProcessingFiles::ModelProcessId).uuid().not_null())
                    .col(ColumnDef::new(ProcessingFiles::FileType).string().not_null())
                    .col(ColumnDef::new(ProcessingFiles::FilePath).string().not_null())
                    .col(ColumnDef::new(ProcessingFiles::FileName).string().not_null())
                    .col(ColumnDef::new(ProcessingFiles::FileSizeBytes).big_integer().not_null())
                    .col(ColumnDef::new(ProcessingFiles::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_processing_files_model_process_id")
                            .from(ProcessingFiles::Table, ProcessingFiles::ModelProcessId)
                            .to(ModelProcesses::Table, ModelProcesses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProcessingFiles::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProcessingFiles {
    Table,
    Id,
    ModelProcessId,
    FileType,
    FilePath,
    FileName,
    FileSizeBytes,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ModelProcesses {
    Table,
    Id,
}
