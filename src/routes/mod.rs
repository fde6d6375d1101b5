mod auth;
mod home;
mod models;
mod projects;
mod prompt_templates;
mod proxy;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::middleware::auth::auth_middleware;
use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        home::root,
        auth::register,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::me,
        auth::update_me,
        projects::create_project,
        projects::list_projects,
        projects::list_model_files,
        projects::get_project,
        projects::delete_project,
        projects::project_status,
        projects::process_image,
        projects::process_model,
        projects::download_file,
        models::upload_model,
        models::model_status,
        models::download_result,
        models::download_result_by_format,
        prompt_templates::list_prompt_templates,
        proxy::health,
        proxy::reconnect,
    ),
    components(
        schemas(
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::LoginResponse,
            auth::RefreshRequest,
            auth::RefreshResponse,
            auth::LogoutRequest,
            auth::LogoutResponse,
            auth::UpdateProfileRequest,
            auth::UserProfile,
            auth::ProfileResponse,
            projects::CreateProjectRequest,
            projects::ProjectResponse,
            projects::ProjectFileResponse,
            projects::ProjectDetailResponse,
            projects::ModelFileResponse,
            models::UploadResponse,
            proxy::ProxyHealthResponse,
            crate::models::params::ProcessImageRequest,
            crate::models::params::ProcessModelRequest,
            crate::models::params::ImageTo3dParams,
            crate::models::params::SkeletonParams,
            crate::models::params::ModelSource,
            crate::models::params::SubmitResponse,
            crate::models::prompt_templates::PromptTemplate,
            crate::services::workflow::ProjectStatusView,
            crate::services::model_process::ModelProcessStatus,
            crate::entities::project::ProjectType,
            crate::entities::project::ProjectStatus,
            crate::entities::model_process::ProcessStatus,
        )
    ),
    tags(
        (name = "General", description = "General API information"),
        (name = "Authentication", description = "Registration, login, token refresh and profile"),
        (name = "Projects", description = "Image to 3D and model to skeleton projects"),
        (name = "Model Processing", description = "Single-shot model upload and rigging"),
        (name = "AI Proxy", description = "AI proxy connection management")
    ),
    info(
        title = "ArticulateHub API",
        version = "0.1.0",
        description = "Backend for image to 3D reconstruction and automatic rigging through an AI proxy",
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(
                utoipa::openapi::security::Http::new(
                    utoipa::openapi::security::HttpAuthScheme::Bearer,
                ),
            ),
        );
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origin = if config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub fn create_routes(state: AppState) -> Router {
    let swagger_router: Router = SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into();

    // Multipart uploads get their own, larger limit.
    let upload_routes = Router::new()
        .route("/models/upload", post(models::upload_model))
        .layer(DefaultBodyLimit::max(state.config.max_file_size));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me).put(auth::update_me))
        .route("/projects", post(projects::create_project).get(projects::list_projects))
        .route("/projects/model-files", get(projects::list_model_files))
        .route(
            "/projects/{id}",
            get(projects::get_project).delete(projects::delete_project),
        )
        .route("/projects/{id}/status", get(projects::project_status))
        .route("/projects/{id}/process-image", post(projects::process_image))
        .route("/projects/{id}/process-model", post(projects::process_model))
        .route("/projects/{id}/download/{file_type}", get(projects::download_file))
        .route("/models/{id}/status", get(models::model_status))
        .route("/models/{id}/download", get(models::download_result))
        .route("/models/{id}/download/{format}", get(models::download_result_by_format))
        .route("/ai/health", get(proxy::health))
        .route("/ai/reconnect", post(proxy::reconnect))
        .merge(upload_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let app_routes = Router::new()
        .route("/", get(home::root))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/prompt-templates", get(prompt_templates::list_prompt_templates))
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(state.config.max_json_body))
        .with_state(state.clone());

    Router::new()
        .merge(swagger_router)
        .merge(app_routes)
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
}
