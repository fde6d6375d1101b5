mod common;

use articulate_hub::entities::project::{ProjectStatus, ProjectType};
use articulate_hub::entities::project_file;
use articulate_hub::error::AppError;
use articulate_hub::models::params::{
    ImageTo3dParams, ModelSource, ProcessImageRequest, ProcessModelRequest, SkeletonParams,
};
use articulate_hub::services::storage::FileStore;
use common::*;
use mockito::Matcher;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

fn image_request() -> ProcessImageRequest {
    ProcessImageRequest {
        image_name: "cat.png".to_string(),
        image_content: png_base64(),
        params: ImageTo3dParams::default(),
    }
}

fn upload_request(content: &[u8]) -> ProcessModelRequest {
    ProcessModelRequest {
        model_source: ModelSource::Upload,
        model_name: Some("robot.glb".to_string()),
        model_content: Some(b64(content)),
        parent_project_id: None,
        params: SkeletonParams {
            text_prompt: "a robot".to_string(),
            ..SkeletonParams::default()
        },
    }
}

fn existing_request(parent: Uuid) -> ProcessModelRequest {
    ProcessModelRequest {
        model_source: ModelSource::ExistingProject,
        model_name: None,
        model_content: None,
        parent_project_id: Some(parent),
        params: SkeletonParams::default(),
    }
}

async fn files_of(app: &TestApp, project_id: Uuid) -> Vec<project_file::Model> {
    project_file::Entity::find()
        .filter(project_file::Column::ProjectId.eq(project_id))
        .all(&app.db)
        .await
        .unwrap()
}

/// Runs a successful image-to-3D job whose glb contains `glb_bytes`.
async fn complete_image_project(app: &mut TestApp, owner: &articulate_hub::entities::user::Model, glb_bytes: &[u8]) -> Uuid {
    let project = create_project(&app.db, owner, ProjectType::ImageTo3d).await;
    let mock = app
        .proxy
        .mock("POST", "/image-to-3d")
        .with_header("content-type", "application/json")
        .with_body(json!({"success": true, "files": {"glb": b64(glb_bytes)}}).to_string())
        .create_async()
        .await;

    app.state
        .workflow
        .submit_image(owner.id, project.id, image_request())
        .await
        .unwrap()
        .settled()
        .await;
    mock.remove_async().await;
    project.id
}

#[tokio::test]
async fn image_to_3d_happy_path_persists_inputs_and_outputs() {
    let mut app = setup().await;
    let owner = create_user(&app.db, "ainz").await;
    let project = create_project(&app.db, &owner, ProjectType::ImageTo3d).await;

    let mock = app
        .proxy
        .mock("POST", "/image-to-3d")
        .match_body(Matcher::PartialJson(json!({
            "image_name": "cat.png",
            "seed": 0,
            "ss_guidance_strength": 7.5,
            "texture_size": 1024
        })))
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "success": true,
                "files": {"glb": b64(b"glTF-binary"), "preview_video": b64(b"mp4")}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let handle = app
        .state
        .workflow
        .submit_image(owner.id, project.id, image_request())
        .await
        .unwrap();
    assert_eq!(handle.id(), project.id);
    handle.settled().await;
    mock.assert_async().await;

    let done = reload(&app.db, project.id).await;
    assert_eq!(done.status, ProjectStatus::Completed);
    assert_eq!(done.error_message, None);

    let files = files_of(&app, project.id).await;
    assert_eq!(files.len(), 3);

    let input = files.iter().find(|f| f.file_type == "input_image").unwrap();
    assert!(input.is_input);
    assert_eq!(input.file_name, "input_cat.png");
    assert_eq!(input.mime_type, "image/png");

    let glb = files.iter().find(|f| f.file_type == "glb").unwrap();
    assert!(!glb.is_input);
    assert_eq!(glb.file_name, "output.glb");
    assert_eq!(glb.mime_type, "model/gltf-binary");
    assert_eq!(glb.file_size, 11);
    assert!(glb.file_path.ends_with(&format!("project_{}/output.glb", project.id)));

    let on_disk = std::fs::read(app.results.path().join(&glb.file_path)).unwrap();
    assert_eq!(on_disk, b"glTF-binary");

    let preview = files.iter().find(|f| f.file_type == "preview_video").unwrap();
    assert_eq!(preview.file_name, "preview.mp4");
    assert_eq!(preview.mime_type, "video/mp4");

    let status = app.state.workflow.status(owner.id, project.id).await.unwrap();
    assert_eq!(status.progress, 100);
}

#[tokio::test]
async fn proxy_rejection_fails_the_project_and_keeps_the_input() {
    let mut app = setup().await;
    let owner = create_user(&app.db, "ainz").await;
    let project = create_project(&app.db, &owner, ProjectType::ImageTo3d).await;

    app.proxy
        .mock("POST", "/image-to-3d")
        .with_header("content-type", "application/json")
        .with_body(json!({"success": false, "error_message": "GPU quota exceeded"}).to_string())
        .create_async()
        .await;

    app.state
        .workflow
        .submit_image(owner.id, project.id, image_request())
        .await
        .unwrap()
        .settled()
        .await;

    let failed = reload(&app.db, project.id).await;
    assert_eq!(failed.status, ProjectStatus::Failed);
    assert!(failed
        .error_message
        .as_deref()
        .unwrap()
        .contains("GPU quota exceeded"));

    let files = files_of(&app, project.id).await;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_type, "input_image");

    let status = app.state.workflow.status(owner.id, project.id).await.unwrap();
    assert_eq!(status.progress, 0);
}

#[tokio::test]
async fn unreachable_proxy_fails_the_project() {
    let app = setup_unreachable_proxy().await;
    let owner = create_user(&app.db, "ainz").await;
    let project = create_project(&app.db, &owner, ProjectType::ModelToSkeleton).await;

    app.state
        .workflow
        .submit_model(owner.id, project.id, upload_request(b"glTF"))
        .await
        .unwrap()
        .settled()
        .await;

    let failed = reload(&app.db, project.id).await;
    assert_eq!(failed.status, ProjectStatus::Failed);
    assert!(failed.error_message.unwrap().starts_with("AI proxy request failed"));
}

#[tokio::test]
async fn proxy_http_error_fails_the_project() {
    let mut app = setup().await;
    let owner = create_user(&app.db, "ainz").await;
    let project = create_project(&app.db, &owner, ProjectType::ModelToSkeleton).await;

    app.proxy
        .mock("POST", "/model-to-skeleton")
        .with_status(502)
        .with_body("bad gateway")
        .create_async()
        .await;

    app.state
        .workflow
        .submit_model(owner.id, project.id, upload_request(b"glTF"))
        .await
        .unwrap()
        .settled()
        .await;

    let failed = reload(&app.db, project.id).await;
    assert_eq!(failed.status, ProjectStatus::Failed);
    assert!(failed.error_message.unwrap().contains("502"));
}

#[tokio::test]
async fn model_to_skeleton_reuses_the_parent_glb() {
    let mut app = setup().await;
    let owner = create_user(&app.db, "ainz").await;
    let parent_id = complete_image_project(&mut app, &owner, b"parent-glb").await;
    let project = create_project(&app.db, &owner, ProjectType::ModelToSkeleton).await;

    let mock = app
        .proxy
        .mock("POST", "/model-to-skeleton")
        .match_body(Matcher::PartialJson(json!({
            "file_name": "output.glb",
            "file_content": b64(b"parent-glb"),
            "confidence": 0.8,
            "preview": true
        })))
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "success": true,
                "file_contents": {
                    "obj": b64(b"v 0 0 0"),
                    "json": b64(b"{\"joints\":[]}"),
                    "zip": b64(b"PK")
                },
                "file_names": {"obj": "ignored.obj"}
            })
            .to_string(),
        )
        .create_async()
        .await;

    app.state
        .workflow
        .submit_model(owner.id, project.id, existing_request(parent_id))
        .await
        .unwrap()
        .settled()
        .await;
    mock.assert_async().await;

    let done = reload(&app.db, project.id).await;
    assert_eq!(done.status, ProjectStatus::Completed);
    assert_eq!(done.parent_project_id, Some(parent_id));

    let files = files_of(&app, project.id).await;
    let names: Vec<_> = files.iter().map(|f| f.file_name.as_str()).collect();
    assert!(names.contains(&"input_output.glb"), "{names:?}");
    assert!(names.contains(&"skeleton.obj"));
    assert!(names.contains(&"skeleton.json"));
    assert!(names.contains(&"skeleton.zip"));

    let obj = files.iter().find(|f| f.file_type == "obj").unwrap();
    assert_eq!(obj.mime_type, "model/obj");
}

#[tokio::test]
async fn parent_without_glb_is_not_found_and_changes_nothing() {
    let app = setup().await;
    let owner = create_user(&app.db, "ainz").await;
    let parent = create_project(&app.db, &owner, ProjectType::ImageTo3d).await;
    let project = create_project(&app.db, &owner, ProjectType::ModelToSkeleton).await;

    let err = app
        .state
        .workflow
        .submit_model(owner.id, project.id, existing_request(parent.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert_eq!(reload(&app.db, project.id).await.status, ProjectStatus::Created);
    assert!(files_of(&app, project.id).await.is_empty());
}

#[tokio::test]
async fn parent_of_another_user_or_wrong_type_is_not_found() {
    let mut app = setup().await;
    let owner = create_user(&app.db, "ainz").await;
    let other = create_user(&app.db, "albedo").await;
    let foreign_parent = complete_image_project(&mut app, &other, b"theirs").await;
    let wrong_type = create_project(&app.db, &owner, ProjectType::ModelToSkeleton).await;
    let project = create_project(&app.db, &owner, ProjectType::ModelToSkeleton).await;

    for parent in [foreign_parent, wrong_type.id, Uuid::new_v4()] {
        let err = app
            .state
            .workflow
            .submit_model(owner.id, project.id, existing_request(parent))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)), "{parent}");
    }
    assert_eq!(reload(&app.db, project.id).await.status, ProjectStatus::Created);
}

#[tokio::test]
async fn missing_fields_are_bad_requests() {
    let app = setup().await;
    let owner = create_user(&app.db, "ainz").await;
    let project = create_project(&app.db, &owner, ProjectType::ModelToSkeleton).await;

    let mut no_content = upload_request(b"x");
    no_content.model_content = None;
    let mut no_parent = existing_request(Uuid::nil());
    no_parent.parent_project_id = None;
    let mut garbage = upload_request(b"x");
    garbage.model_content = Some("***".to_string());

    for request in [no_content, no_parent, garbage] {
        let err = app
            .state
            .workflow
            .submit_model(owner.id, project.id, request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    let image_project = create_project(&app.db, &owner, ProjectType::ImageTo3d).await;
    let mut not_an_image = image_request();
    not_an_image.image_content = b64(b"plain text, not pixels");
    let err = app
        .state
        .workflow
        .submit_image(owner.id, image_project.id, not_an_image)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    assert_eq!(reload(&app.db, project.id).await.status, ProjectStatus::Created);
    assert_eq!(reload(&app.db, image_project.id).await.status, ProjectStatus::Created);
}

#[tokio::test]
async fn wrong_project_type_is_rejected_without_state_change() {
    let app = setup().await;
    let owner = create_user(&app.db, "ainz").await;
    let skeleton_project = create_project(&app.db, &owner, ProjectType::ModelToSkeleton).await;
    let image_project = create_project(&app.db, &owner, ProjectType::ImageTo3d).await;

    let err = app
        .state
        .workflow
        .submit_image(owner.id, skeleton_project.id, image_request())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = app
        .state
        .workflow
        .submit_model(owner.id, image_project.id, upload_request(b"glTF"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert_eq!(reload(&app.db, skeleton_project.id).await.status, ProjectStatus::Created);
    assert_eq!(reload(&app.db, image_project.id).await.status, ProjectStatus::Created);
}

#[tokio::test]
async fn foreign_projects_look_missing() {
    let app = setup().await;
    let owner = create_user(&app.db, "ainz").await;
    let intruder = create_user(&app.db, "shalltear").await;
    let project = create_project(&app.db, &owner, ProjectType::ImageTo3d).await;

    let err = app
        .state
        .workflow
        .submit_image(intruder.id, project.id, image_request())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = app.state.workflow.status(intruder.id, project.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(reload(&app.db, project.id).await.status, ProjectStatus::Created);
}

#[tokio::test]
async fn resubmitting_while_processing_conflicts() {
    let app = setup().await;
    let owner = create_user(&app.db, "ainz").await;
    let project = create_project(&app.db, &owner, ProjectType::ImageTo3d).await;
    set_status(&app.db, &project, ProjectStatus::Processing).await;

    let err = app
        .state
        .workflow
        .submit_image(owner.id, project.id, image_request())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(reload(&app.db, project.id).await.status, ProjectStatus::Processing);
    assert!(files_of(&app, project.id).await.is_empty());
}

#[tokio::test]
async fn reprocessing_a_finished_project_serves_the_latest_output() {
    let mut app = setup().await;
    let owner = create_user(&app.db, "ainz").await;
    let project_id = complete_image_project(&mut app, &owner, b"first").await;
    let first = app
        .state
        .workflow
        .files()
        .latest(project_id, "glb")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.file_size, 5);

    // make sure the second run gets a later created_at
    tokio::time::sleep(Duration::from_millis(20)).await;

    app.proxy
        .mock("POST", "/image-to-3d")
        .with_header("content-type", "application/json")
        .with_body(json!({"success": true, "files": {"glb": b64(b"second")}}).to_string())
        .create_async()
        .await;
    app.state
        .workflow
        .submit_image(owner.id, project_id, image_request())
        .await
        .unwrap()
        .settled()
        .await;

    assert_eq!(reload(&app.db, project_id).await.status, ProjectStatus::Completed);

    let files = app.state.workflow.files();
    let latest = files.latest(project_id, "glb").await.unwrap().unwrap();
    assert_ne!(latest.id, first.id);
    assert_eq!(latest.file_size, 6);
    assert!(latest.created_at > first.created_at);
    assert_eq!(files.store().read(&latest.file_path).await.unwrap(), b"second");

    let glb_rows = files_of(&app, project_id)
        .await
        .into_iter()
        .filter(|f| f.file_type == "glb")
        .count();
    assert_eq!(glb_rows, 2);
}

#[tokio::test]
async fn invalid_output_tag_fails_the_project() {
    let mut app = setup().await;
    let owner = create_user(&app.db, "ainz").await;
    let project = create_project(&app.db, &owner, ProjectType::ImageTo3d).await;

    app.proxy
        .mock("POST", "/image-to-3d")
        .with_header("content-type", "application/json")
        .with_body(json!({"success": true, "files": {"../escape": b64(b"x")}}).to_string())
        .create_async()
        .await;

    app.state
        .workflow
        .submit_image(owner.id, project.id, image_request())
        .await
        .unwrap()
        .settled()
        .await;

    let failed = reload(&app.db, project.id).await;
    assert_eq!(failed.status, ProjectStatus::Failed);
    assert!(failed.error_message.unwrap().contains("invalid file type"));
}

#[tokio::test]
async fn guards_run_before_payload_validation() {
    let app = setup().await;
    let owner = create_user(&app.db, "ainz").await;
    let intruder = create_user(&app.db, "shalltear").await;
    let image_project = create_project(&app.db, &owner, ProjectType::ImageTo3d).await;
    let skeleton_project = create_project(&app.db, &owner, ProjectType::ModelToSkeleton).await;

    let mut not_an_image = image_request();
    not_an_image.image_content = "***".to_string();

    for (user, project_id) in [(&intruder, image_project.id), (&owner, skeleton_project.id)] {
        let err = app
            .state
            .workflow
            .submit_image(user.id, project_id, not_an_image.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)), "{err}");
    }
}

#[tokio::test]
async fn deleting_a_running_project_is_refused_and_leaves_no_orphans() {
    let mut app = setup().await;
    let owner = create_user(&app.db, "ainz").await;
    let project = create_project(&app.db, &owner, ProjectType::ImageTo3d).await;

    // Slow proxy: the delete lands while the continuation waits on it.
    let body = json!({"success": true, "files": {"glb": b64(b"late glb")}}).to_string();
    app.proxy
        .mock("POST", "/image-to-3d")
        .with_header("content-type", "application/json")
        .with_body_from_request(move |_| {
            std::thread::sleep(Duration::from_millis(400));
            body.clone().into_bytes()
        })
        .create_async()
        .await;

    let job = app
        .state
        .workflow
        .submit_image(owner.id, project.id, image_request())
        .await
        .unwrap();
    let err = app.state.workflow.delete(owner.id, project.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "{err}");
    job.settled().await;

    assert_eq!(reload(&app.db, project.id).await.status, ProjectStatus::Completed);
    let rows = files_of(&app, project.id).await;
    assert_eq!(rows.len(), 2);
    let store = app.state.workflow.files().store().clone();
    for row in &rows {
        assert!(store.exists(&row.file_path).await, "{}", row.file_path);
    }

    let removed = app.state.workflow.delete(owner.id, project.id).await.unwrap();
    assert_eq!(removed, 2);
    assert!(files_of(&app, project.id).await.is_empty());
    for row in &rows {
        assert!(!store.exists(&row.file_path).await, "{}", row.file_path);
    }
    let dir = app.results.path().join(FileStore::project_dir(project.id));
    let leftovers = std::fs::read_dir(&dir).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);

    let err = app.state.workflow.status(owner.id, project.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
