pub mod model_process;
pub mod processing_file;
pub mod project;
pub mod project_file;
pub mod refresh_token;
pub mod user;
