use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct PromptTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub template: &'static str,
    pub category: &'static str,
}

pub const PROMPT_TEMPLATES: &[PromptTemplate] = &[
    PromptTemplate {
        id: "realistic",
        name: "Realistic",
        description: "Push the model towards realism and fine detail",
        template: "realistic, detailed, high quality, photorealistic",
        category: "style",
    },
    PromptTemplate {
        id: "cartoon",
        name: "Cartoon",
        description: "Cartoon or animated look",
        template: "cartoon style, animated, colorful, stylized",
        category: "style",
    },
    PromptTemplate {
        id: "metallic",
        name: "Metallic",
        description: "Metal surface finish",
        template: "metallic surface, reflective, chrome, steel",
        category: "material",
    },
    PromptTemplate {
        id: "wooden",
        name: "Wooden",
        description: "Wood material and grain",
        template: "wooden texture, natural wood grain, organic",
        category: "material",
    },
    PromptTemplate {
        id: "futuristic",
        name: "Futuristic",
        description: "Science fiction styling",
        template: "futuristic, sci-fi, high-tech, cyberpunk",
        category: "theme",
    },
    PromptTemplate {
        id: "vintage",
        name: "Vintage",
        description: "Retro, weathered styling",
        template: "vintage, retro, classic, aged, weathered",
        category: "theme",
    },
];

pub fn find_template(id: &str) -> Option<&'static PromptTemplate> {
    PROMPT_TEMPLATES.iter().find(|t| t.id == id)
}
