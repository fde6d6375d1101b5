#![allow(dead_code)]

use std::io::Cursor;
use std::time::Duration;

use articulate_hub::config::Config;
use articulate_hub::entities::project::{self, ProjectStatus, ProjectType};
use articulate_hub::entities::user;
use articulate_hub::middleware::auth::issue_access_token;
use articulate_hub::services::accounts;
use articulate_hub::AppState;
use base64::{engine::general_purpose, Engine as _};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, Set};
use tempfile::TempDir;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret";

pub struct TestApp {
    pub db: DatabaseConnection,
    pub state: AppState,
    pub proxy: mockito::ServerGuard,
    pub results: TempDir,
    pub uploads: TempDir,
}

pub async fn test_db() -> DatabaseConnection {
    // A single connection keeps the in-memory database alive and shared.
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(opts).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

pub fn test_config(proxy_url: &str, results: &TempDir, uploads: &TempDir) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        proxy_url: proxy_url.to_string(),
        proxy_timeout: Duration::from_secs(5),
        results_dir: results.path().to_path_buf(),
        uploads_dir: uploads.path().to_path_buf(),
        max_file_size: 10 * 1024 * 1024,
        max_json_body: 10 * 1024 * 1024,
        port: 0,
        allowed_origins: vec!["http://localhost:3000".to_string()],
        access_token_ttl_secs: 900,
        refresh_token_ttl_days: 1,
    }
}

pub async fn setup() -> TestApp {
    let proxy = mockito::Server::new_async().await;
    setup_with_proxy_url(proxy).await
}

async fn setup_with_proxy_url(proxy: mockito::ServerGuard) -> TestApp {
    let db = test_db().await;
    let results = tempfile::tempdir().unwrap();
    let uploads = tempfile::tempdir().unwrap();
    let config = test_config(&proxy.url(), &results, &uploads);
    let state = AppState::new(db.clone(), config).unwrap();
    TestApp {
        db,
        state,
        proxy,
        results,
        uploads,
    }
}

/// Same as [`setup`] but the proxy URL points at a port nobody listens on.
pub async fn setup_unreachable_proxy() -> TestApp {
    let mut app = setup().await;
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let config = test_config(&dead_url, &app.results, &app.uploads);
    app.state = AppState::new(app.db.clone(), config).unwrap();
    app
}

pub async fn create_user(db: &DatabaseConnection, username: &str) -> user::Model {
    accounts::create_user(db, &format!("{username}@example.com"), username, "passw0rd123")
        .await
        .unwrap()
}

pub fn token_for(user: &user::Model) -> String {
    issue_access_token(JWT_SECRET, user, 900).unwrap()
}

pub async fn create_project(
    db: &DatabaseConnection,
    owner: &user::Model,
    project_type: ProjectType,
) -> project::Model {
    let now = chrono::Utc::now().naive_utc();
    project::ActiveModel {
        id: Set(Uuid::new_v4()),
        owner_id: Set(owner.id),
        name: Set(format!("{project_type:?} project")),
        description: Set(None),
        project_type: Set(project_type),
        status: Set(ProjectStatus::Created),
        user_prompt: Set(None),
        parent_project_id: Set(None),
        error_message: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn reload(db: &DatabaseConnection, project_id: Uuid) -> project::Model {
    project::Entity::find_by_id(project_id)
        .one(db)
        .await
        .unwrap()
        .unwrap()
}

pub async fn set_status(db: &DatabaseConnection, project: &project::Model, status: ProjectStatus) {
    let mut active: project::ActiveModel = project.clone().into();
    active.status = Set(status);
    active.update(db).await.unwrap();
}

pub fn b64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// A real 2x2 PNG, base64 encoded.
pub fn png_base64() -> String {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(2, 2, image::Rgb([200, 40, 90])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    b64(&buf)
}
