use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ModelProcesses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ModelProcesses::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ModelProcesses::OwnerId).uuid().not_null())
                    .col(ColumnDef::new(ModelProcesses::OriginalFilename).string().not_null())
                    .col(ColumnDef::new(ModelProcesses::FilePath).string().not_null())
                    .col(ColumnDef::new(ModelProcesses::UserPrompt).text().not_null())
                    .col(ColumnDef::new(ModelProcesses::TemplateId).string().not_null())
                    .col(ColumnDef::new(ModelProcesses::PromptWeight).double().not_null())
                    .col(ColumnDef::new(ModelProcesses::Status).string().not_null())
                    .col(
                        ColumnDef::new(ModelProcesses::Progress)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ModelProcesses::ResultPath).string())
                    .col(ColumnDef::new(ModelProcesses::ResultFilename).string())
                    .col(ColumnDef::new(ModelProcesses::Error).text())
                    .col(ColumnDef::new(ModelProcesses::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(ModelProcesses::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_model_processes_owner")
                            .from(ModelProcesses::Table, ModelProcesses::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ModelProcesses::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ModelProcesses {
    Table,
    Id,
    OwnerId,
    OriginalFilename,
    FilePath,
    UserPrompt,
    TemplateId,
    PromptWeight,
    Status,
    Progress,
    ResultPath,
    ResultFilename,
    Error,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
