use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde_json::json;

use crate::common::{Phase, TestApp, TestResponse, hours_from_now, routes, zip_part};

mod compos {
    use super::*;

    #[tokio::test]
    async fn compo_exposes_its_time_windows() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let id = app.create_compo(&admin, event_id, Phase::Voting).await;

        let res = app.get_without_token(&routes::compo(id)).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["is_adding_open"], false);
        assert_eq!(res.body["is_voting_open"], true);
        assert_eq!(res.body["has_voting_started"], true);
        assert_eq!(res.body["entry_formats"], "zip|7z|tar.gz|tar.bz2");
    }

    #[tokio::test]
    async fn voting_must_end_after_it_starts() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;

        let res = app
            .post_with_token(
                routes::COMPOS,
                &json!({
                    "event_id": event_id,
                    "name": "Demo",
                    "adding_end": hours_from_now(1),
                    "editing_end": hours_from_now(2),
                    "compo_start": hours_from_now(3),
                    "voting_start": hours_from_now(5),
                    "voting_end": hours_from_now(4),
                }),
                &admin,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn inactive_compo_is_hidden_from_the_public() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let id = app
            .create_compo_with(&admin, event_id, Phase::Adding, json!({"active": false}))
            .await;

        let public = app.get_without_token(&routes::compo(id)).await;
        assert_eq!(public.status, 404);

        let managed = app.get_with_token(&routes::compo(id), &admin).await;
        assert_eq!(managed.status, 200);
    }

    #[tokio::test]
    async fn compo_with_entries_cannot_be_deleted() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let id = app.create_compo(&admin, event_id, Phase::Adding).await;
        let entry = app.create_entry(&admin, id, "Pulse").await;
        assert_eq!(entry.status, 201, "{}", entry.text);

        let res = app.delete_with_token(&routes::compo(id), &admin).await;
        assert_eq!(res.status, 409);
    }
}

mod entries {
    use super::*;

    #[tokio::test]
    async fn user_can_submit_while_adding_is_open() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let compo_id = app.create_compo(&admin, event_id, Phase::Adding).await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app.create_entry(&token, compo_id, "Pulse").await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["name"], "Pulse");
        assert_eq!(res.body["entryfile"]["filename"], "Pulse.zip");
        let id = res.id();
        assert_eq!(
            res.body["entryfile"]["url"],
            routes::entry_file(id, "entryfile")
        );

        let mine = app.get_with_token(routes::MY_ENTRIES, &token).await;
        assert_eq!(mine.status, 200);
        assert_eq!(mine.body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn owner_can_download_their_file() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let compo_id = app.create_compo(&admin, event_id, Phase::Adding).await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app.create_entry(&token, compo_id, "Pulse").await.id();

        let res = app
            .get_with_token(&routes::entry_file(id, "entryfile"), &token)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.text, "PK\u{3}\u{4}demo");

        // Entries stay private until voting starts.
        let public = app
            .get_without_token(&routes::entry_file(id, "entryfile"))
            .await;
        assert_eq!(public.status, 404);
    }

    #[tokio::test]
    async fn submission_after_adding_closed_is_rejected() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let compo_id = app.create_compo(&admin, event_id, Phase::Voting).await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app.create_entry(&token, compo_id, "Late").await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn entry_file_must_have_an_allowed_extension() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let compo_id = app.create_compo(&admin, event_id, Phase::Adding).await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let form = Form::new()
            .text("name", "Pulse")
            .text("creator", "Group")
            .part("entryfile", zip_part("pulse.exe".into(), b"MZ"));
        let res = app
            .multipart_with_token(Method::POST, &routes::compo_entries(compo_id), form, &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn oversized_file_is_rejected() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let compo_id = app
            .create_compo_with(
                &admin,
                event_id,
                Phase::Adding,
                json!({"max_entry_size": 16}),
            )
            .await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let form = Form::new()
            .text("name", "Pulse")
            .text("creator", "Group")
            .part("entryfile", zip_part("pulse.zip".into(), &[0u8; 64]));
        let res = app
            .multipart_with_token(Method::POST, &routes::compo_entries(compo_id), form, &token)
            .await;

        assert_eq!(res.status, 413);
        assert_eq!(res.body["code"], "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn other_users_cannot_edit_an_entry() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let compo_id = app.create_compo(&admin, event_id, Phase::Adding).await;
        let alice = app.create_authenticated_user("alice", "securepass").await;
        let bob = app.create_authenticated_user("bob", "securepass").await;
        let id = app.create_entry(&alice, compo_id, "Pulse").await.id();

        let form = Form::new().text("name", "Stolen");
        let res = app
            .multipart_with_token(Method::PATCH, &routes::entry(id), form, &bob)
            .await;
        assert_eq!(res.status, 403);

        let form = Form::new().text("name", "Pulse 2");
        let res = app
            .multipart_with_token(Method::PATCH, &routes::entry(id), form, &alice)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["name"], "Pulse 2");
        assert_eq!(res.body["entryfile"]["filename"], "Pulse.zip");
    }

    #[tokio::test]
    async fn owner_can_withdraw_while_adding_is_open() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let compo_id = app.create_compo(&admin, event_id, Phase::Adding).await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app.create_entry(&token, compo_id, "Pulse").await.id();

        let res = app.delete_with_token(&routes::entry(id), &token).await;
        assert_eq!(res.status, 204, "{}", res.text);

        let res = app.get_with_token(&routes::entry(id), &token).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn replaced_and_withdrawn_files_are_cleaned_up() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let compo_id = app.create_compo(&admin, event_id, Phase::Adding).await;
        let token = app.create_authenticated_user("alice", "securepass").await;
        let id = app.create_entry(&token, compo_id, "Pulse").await.id();
        assert_eq!(app.blob_object_count().await, 1);
        assert_eq!(app.stored_file_count(), 1);

        let form = Form::new().part(
            "entryfile",
            zip_part("pulse-final.zip".into(), b"PK\x03\x04final"),
        );
        let res = app
            .multipart_with_token(Method::PATCH, &routes::entry(id), form, &token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["entryfile"]["filename"], "pulse-final.zip");
        assert_eq!(app.blob_object_count().await, 1);
        assert_eq!(app.stored_file_count(), 1);

        let res = app.delete_with_token(&routes::entry(id), &token).await;
        assert_eq!(res.status, 204, "{}", res.text);
        assert_eq!(app.blob_object_count().await, 0);
        assert_eq!(app.stored_file_count(), 0);
    }
}

mod thumbnails {
    use super::*;

    fn png_part() -> Part {
        Part::bytes(b"\x89PNG\r\n\x1a\nshot".to_vec())
            .file_name("shot.png")
            .mime_str("image/png")
            .expect("Failed to set MIME type")
    }

    async fn compo_with_pref(app: &TestApp, admin: &str, pref: &str) -> i32 {
        let event_id = app.create_event(admin, "Instanssi 2026").await;
        app.create_compo_with(admin, event_id, Phase::Adding, json!({"thumbnail_pref": pref}))
            .await
    }

    async fn submit(app: &TestApp, token: &str, compo_id: i32, with_image: bool) -> TestResponse {
        let mut form = Form::new()
            .text("name", "Still life")
            .text("creator", "Pixel Group")
            .part("entryfile", zip_part("still.zip".into(), b"PK\x03\x04gfx"));
        if with_image {
            form = form.part("imagefile", png_part());
        }
        app.multipart_with_token(Method::POST, &routes::compo_entries(compo_id), form, token)
            .await
    }

    #[tokio::test]
    async fn image_pref_requires_an_imagefile() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let compo_id = compo_with_pref(&app, &admin, "image").await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let missing = submit(&app, &token, compo_id, false).await;
        assert_eq!(missing.status, 400);
        assert_eq!(missing.body["code"], "VALIDATION_ERROR");
        assert_eq!(app.stored_file_count(), 0);

        let res = submit(&app, &token, compo_id, true).await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["imagefile"]["filename"], "shot.png");
    }

    #[tokio::test]
    async fn entry_file_pref_rejects_a_separate_image() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let compo_id = compo_with_pref(&app, &admin, "entry_file").await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = submit(&app, &token, compo_id, true).await;
        assert_eq!(res.status, 400);
        assert_eq!(app.blob_object_count().await, 0);
        assert_eq!(app.stored_file_count(), 0);

        let res = submit(&app, &token, compo_id, false).await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert!(res.body["imagefile"].is_null());
    }

    #[tokio::test]
    async fn none_pref_rejects_any_image() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let compo_id = compo_with_pref(&app, &admin, "none").await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = submit(&app, &token, compo_id, true).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        let res = submit(&app, &token, compo_id, false).await;
        assert_eq!(res.status, 201, "{}", res.text);
    }

    #[tokio::test]
    async fn optional_pref_accepts_both() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let compo_id = compo_with_pref(&app, &admin, "optional").await;
        let alice = app.create_authenticated_user("alice", "securepass").await;
        let bob = app.create_authenticated_user("bob", "securepass").await;

        let with_image = submit(&app, &alice, compo_id, true).await;
        assert_eq!(with_image.status, 201, "{}", with_image.text);
        assert_eq!(with_image.body["imagefile"]["filename"], "shot.png");

        let without = submit(&app, &bob, compo_id, false).await;
        assert_eq!(without.status, 201, "{}", without.text);
        assert!(without.body["imagefile"].is_null());
    }
}
