pub mod accounts;
pub mod job;
pub mod model_process;
pub mod project_files;
pub mod proxy;
pub mod storage;
pub mod workflow;
