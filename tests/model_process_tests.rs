mod common;

use articulate_hub::entities::model_process::{self, ProcessStatus};
use articulate_hub::entities::processing_file;
use articulate_hub::error::AppError;
use articulate_hub::services::model_process::UploadedModel;
use common::*;
use mockito::Matcher;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;

fn upload(name: &str) -> UploadedModel {
    UploadedModel {
        original_filename: name.to_string(),
        bytes: b"o robot\nv 0 0 0\n".to_vec(),
        user_prompt: "a knight".to_string(),
        template_id: "metallic".to_string(),
        prompt_weight: 0.7,
    }
}

#[tokio::test]
async fn upload_runs_to_completion_and_records_known_files() {
    let mut app = setup().await;
    let owner = create_user(&app.db, "ainz").await;

    let mock = app
        .proxy
        .mock("POST", "/process")
        .match_body(Matcher::PartialJson(json!({
            "text_prompt": "a knight",
            "confidence": 0.8,
            "preview": true,
            "extra_params": {"templateId": "metallic", "promptWeight": 0.7}
        })))
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "success": true,
                "file_contents": {
                    "obj": b64(b"v 1 1 1"),
                    "json": b64(b"{}"),
                    "zip": b64(b"PK\x03\x04"),
                    "extra": b64(b"unrecorded")
                },
                "file_names": {"obj": "rig.obj", "zip": "../../bundle.zip"}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let (record, job) = app.state.models.upload(owner.id, upload("knight.OBJ")).await.unwrap();
    assert_eq!(record.status, ProcessStatus::Processing);
    assert_eq!(record.progress, 0);
    assert!(record.file_path.ends_with(".obj"));
    job.settled().await;
    mock.assert_async().await;

    let status = app.state.models.status(owner.id, record.id).await.unwrap();
    assert_eq!(status.status, ProcessStatus::Completed);
    assert_eq!(status.progress, 100);
    assert_eq!(status.result_url, Some(format!("/models/{}/download", record.id)));

    let done = model_process::Entity::find_by_id(record.id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.result_filename, Some(format!("skeleton_{}.json", record.id)));
    assert!(done.result_path.unwrap().ends_with("/output.json"));

    let files = processing_file::Entity::find()
        .filter(processing_file::Column::ModelProcessId.eq(record.id))
        .all(&app.db)
        .await
        .unwrap();
    assert_eq!(files.len(), 3);

    let zip = app.state.models.result_file(owner.id, record.id, None).await.unwrap();
    assert_eq!(zip.file_name, "bundle.zip");
    assert_eq!(zip.mime_type, "application/zip");

    let obj = app.state.models.result_file(owner.id, record.id, Some("OBJ")).await.unwrap();
    assert_eq!(obj.file_name, "rig.obj");
    assert_eq!(obj.mime_type, "model/obj");

    let missing = app.state.models.result_file(owner.id, record.id, Some("extra")).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    // written to disk even though no row exists for it
    let extra = app.results.path().join(zip.relative_path.replace("bundle.zip", "output.extra"));
    assert!(extra.exists());
}

#[tokio::test]
async fn rejected_processing_is_recorded_as_failed() {
    let mut app = setup().await;
    let owner = create_user(&app.db, "ainz").await;

    app.proxy
        .mock("POST", "/process")
        .with_header("content-type", "application/json")
        .with_body(json!({"success": false, "error_message": "no mesh found"}).to_string())
        .create_async()
        .await;

    let (record, job) = app.state.models.upload(owner.id, upload("knight.glb")).await.unwrap();
    job.settled().await;

    let status = app.state.models.status(owner.id, record.id).await.unwrap();
    assert_eq!(status.status, ProcessStatus::Failed);
    assert_eq!(status.progress, 0);
    assert!(status.error.unwrap().contains("no mesh found"));
    assert!(status.result_url.is_none());

    let download = app.state.models.result_file(owner.id, record.id, None).await;
    assert!(matches!(download, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn unreachable_proxy_gets_a_friendly_message() {
    let app = setup_unreachable_proxy().await;
    let owner = create_user(&app.db, "ainz").await;

    let (record, job) = app.state.models.upload(owner.id, upload("knight.stl")).await.unwrap();
    job.settled().await;

    let status = app.state.models.status(owner.id, record.id).await.unwrap();
    assert_eq!(status.status, ProcessStatus::Failed);
    assert_eq!(
        status.error.as_deref(),
        Some("AI processing service unreachable, please retry later")
    );
}

#[tokio::test]
async fn unsupported_extensions_and_foreign_ids_are_rejected() {
    let app = setup().await;
    let owner = create_user(&app.db, "ainz").await;
    let intruder = create_user(&app.db, "cocytus").await;

    let err = app.state.models.upload(owner.id, upload("notes.txt")).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let count = model_process::Entity::find().all(&app.db).await.unwrap().len();
    assert_eq!(count, 0);

    let (record, job) = app.state.models.upload(owner.id, upload("knight.fbx")).await.unwrap();
    job.detach();
    let err = app.state.models.status(intruder.id, record.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
