pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_users_table;
mod m20241201_000002_create_refresh_tokens_table;
mod m20241202_000003_create_projects_table;
mod m20241204_000004_create_project_files_table;
mod m20241204_000005_create_model_processes_table;
mod m20241204_000006_create_processing_files_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20241201_000002_create_refresh_tokens_table::Migration),
            Box::new(m20241202_000003_create_projects_table::Migration),
            Box::new(m20241204_000004_create_project_files_table::Migration),
            Box::new(m20241204_000005_create_model_processes_table::Migration),
            Box::new(m20241204_000006_create_processing_files_table::Migration),
        ]
    }
}
