use axum::response::Json;

use crate::models::prompt_templates::{PromptTemplate, PROMPT_TEMPLATES};

#[utoipa::path(
    get,
    path = "/prompt-templates",
    responses(
        (status = 200, description = "Available prompt templates", body = [PromptTemplate])
    ),
    tag = "Model Processing"
)]
pub async fn list_prompt_templates() -> Json<&'static [PromptTemplate]> {
    Json(PROMPT_TEMPLATES)
}
