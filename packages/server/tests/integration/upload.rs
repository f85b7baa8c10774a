use reqwest::Method;
use reqwest::multipart::{Form, Part};

use crate::common::{TestApp, routes};

fn uploads_of(event_id: i32) -> String {
    format!("{}?event_id={event_id}", routes::UPLOADS)
}

fn text_file(name: &str, content: &str) -> Part {
    Part::bytes(content.as_bytes().to_vec()).file_name(name.to_string())
}

#[tokio::test]
async fn uploaded_file_is_publicly_downloadable() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let event_id = app.create_event(&admin, "Instanssi 2026").await;

    let form = Form::new()
        .text("description", "Timetable")
        .part("file", text_file("timetable.txt", "Friday 18:00 doors open"));
    let res = app
        .multipart_with_token(Method::POST, &uploads_of(event_id), form, &admin)
        .await;
    assert_eq!(res.status, 201, "{}", res.text);
    assert_eq!(res.body["description"], "Timetable");
    assert_eq!(res.body["file"]["filename"], "timetable.txt");
    let id = res.id();

    let file = app.get_without_token(&routes::upload_file(id)).await;
    assert_eq!(file.status, 200);
    assert_eq!(file.text, "Friday 18:00 doors open");
    assert!(file.content_type.unwrap().starts_with("text/plain"));

    let list = app.get_with_token(&uploads_of(event_id), &admin).await;
    assert_eq!(list.status, 200, "{}", list.text);
    assert_eq!(list.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn upload_requires_a_file() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let event_id = app.create_event(&admin, "Instanssi 2026").await;

    let form = Form::new().text("description", "Nothing attached");
    let res = app
        .multipart_with_token(Method::POST, &uploads_of(event_id), form, &admin)
        .await;
    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn regular_user_cannot_upload() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let event_id = app.create_event(&admin, "Instanssi 2026").await;
    let token = app.create_authenticated_user("alice", "securepass").await;

    let form = Form::new().part("file", text_file("a.txt", "a"));
    let res = app
        .multipart_with_token(Method::POST, &uploads_of(event_id), form, &token)
        .await;
    assert_eq!(res.status, 403);
}

#[tokio::test]
async fn file_can_be_replaced_and_deleted() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let event_id = app.create_event(&admin, "Instanssi 2026").await;
    let form = Form::new().part("file", text_file("rules.txt", "v1"));
    let id = app
        .multipart_with_token(Method::POST, &uploads_of(event_id), form, &admin)
        .await
        .id();

    let form = Form::new()
        .text("description", "Compo rules")
        .part("file", text_file("rules.txt", "v2"));
    let res = app
        .multipart_with_token(Method::PATCH, &routes::upload(id), form, &admin)
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["description"], "Compo rules");

    let file = app.get_without_token(&routes::upload_file(id)).await;
    assert_eq!(file.text, "v2");
    // The replaced content is no longer stored.
    assert_eq!(app.blob_object_count().await, 1);
    assert_eq!(app.stored_file_count(), 1);

    let res = app.delete_with_token(&routes::upload(id), &admin).await;
    assert_eq!(res.status, 204, "{}", res.text);
    let file = app.get_without_token(&routes::upload_file(id)).await;
    assert_eq!(file.status, 404);
    assert_eq!(app.blob_object_count().await, 0);
    assert_eq!(app.stored_file_count(), 0);
}

#[tokio::test]
async fn shared_content_survives_deleting_one_upload() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let event_id = app.create_event(&admin, "Instanssi 2026").await;
    let mut ids = Vec::new();
    for name in ["map.txt", "map-copy.txt"] {
        let form = Form::new().part("file", text_file(name, "Hall B, table 12"));
        let res = app
            .multipart_with_token(Method::POST, &uploads_of(event_id), form, &admin)
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        ids.push(res.id());
    }
    assert_eq!(app.blob_object_count().await, 1);
    assert_eq!(app.stored_file_count(), 1);

    let res = app.delete_with_token(&routes::upload(ids[0]), &admin).await;
    assert_eq!(res.status, 204, "{}", res.text);

    let file = app.get_without_token(&routes::upload_file(ids[1])).await;
    assert_eq!(file.status, 200);
    assert_eq!(file.text, "Hall B, table 12");
    assert_eq!(app.stored_file_count(), 1);

    let res = app.delete_with_token(&routes::upload(ids[1]), &admin).await;
    assert_eq!(res.status, 204, "{}", res.text);
    assert_eq!(app.blob_object_count().await, 0);
    assert_eq!(app.stored_file_count(), 0);
}

#[tokio::test]
async fn rejected_upload_leaves_nothing_behind() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let event_id = app.create_event(&admin, "Instanssi 2026").await;

    let form = Form::new()
        .part("file", text_file("notes.txt", "kept nowhere"))
        .text("description", "x".repeat(2001));
    let res = app
        .multipart_with_token(Method::POST, &uploads_of(event_id), form, &admin)
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(app.blob_object_count().await, 0);
    assert_eq!(app.stored_file_count(), 0);
}
