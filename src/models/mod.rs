pub mod file_type;
pub mod params;
pub mod prompt_templates;
