use chrono::{Duration, Utc};
use serde_json::json;

use crate::common::{Phase, TestApp, at, routes};

fn unarchive(id: i32) -> String {
    format!("{}/unarchive", routes::archived_event(id))
}

mod finalize {
    use super::*;

    #[tokio::test]
    async fn refused_while_voting_is_open() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        app.create_compo(&admin, event_id, Phase::Voting).await;

        let res = app
            .post_with_token(&routes::finalize_archive(event_id), &json!({}), &admin)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        let event = app.get_without_token(&routes::event(event_id)).await;
        assert_eq!(event.body["archived"], false);
    }

    #[tokio::test]
    async fn freezes_ranks_and_removes_ballots() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let compo_id = app.create_compo(&admin, event_id, Phase::Voting).await;
        let a = app.create_entry(&admin, compo_id, "Alpha").await.id();
        let b = app.create_entry(&admin, compo_id, "Beta").await.id();
        let alice = app.create_authenticated_user("alice", "securepass").await;
        app.grant_voting_rights(event_id, &alice, &admin).await;
        let res = app
            .put_with_token(&routes::compo_votes(compo_id), &json!({"entry_ids": [b, a]}), &alice)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let closed = app
            .patch_with_token(
                &routes::compo(compo_id),
                &json!({"voting_end": at(Utc::now() - Duration::minutes(1))}),
                &admin,
            )
            .await;
        assert_eq!(closed.status, 200, "{}", closed.text);

        let res = app
            .post_with_token(
                &routes::finalize_archive(event_id),
                &json!({"remove_votes": true}),
                &admin,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["event"]["archived"], true);
        assert_eq!(res.body["removed_vote_groups"], 1);

        let frozen = app.get_with_token(&routes::entry(b), &admin).await;
        assert_eq!(frozen.body["archive_rank"], 1);
        assert_eq!(frozen.body["archive_score"], 1.0);

        // Ballots are gone but the archived results remain.
        let detail = app.get_without_token(&routes::archived_event(event_id)).await;
        assert_eq!(detail.status, 200, "{}", detail.text);
        let entries = &detail.body["compos"][0]["entries"];
        assert_eq!(entries[0]["id"], b);
        assert_eq!(entries[0]["rank"], 1);
        assert_eq!(entries[1]["id"], a);
        assert_eq!(entries[1]["score"], 0.5);
    }

    #[tokio::test]
    async fn finalizing_again_keeps_frozen_results() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let compo_id = app.create_compo(&admin, event_id, Phase::Voting).await;
        let a = app.create_entry(&admin, compo_id, "Alpha").await.id();
        let b = app.create_entry(&admin, compo_id, "Beta").await.id();
        let alice = app.create_authenticated_user("alice", "securepass").await;
        app.grant_voting_rights(event_id, &alice, &admin).await;
        let res = app
            .put_with_token(&routes::compo_votes(compo_id), &json!({"entry_ids": [b, a]}), &alice)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        app.patch_with_token(
            &routes::compo(compo_id),
            &json!({"voting_end": at(Utc::now() - Duration::minutes(1))}),
            &admin,
        )
        .await;

        let first = app
            .post_with_token(
                &routes::finalize_archive(event_id),
                &json!({"remove_votes": true}),
                &admin,
            )
            .await;
        assert_eq!(first.status, 200, "{}", first.text);
        let res = app.post_with_token(&unarchive(event_id), &json!({}), &admin).await;
        assert_eq!(res.status, 200, "{}", res.text);
        let second = app
            .post_with_token(
                &routes::finalize_archive(event_id),
                &json!({"remove_votes": true}),
                &admin,
            )
            .await;
        assert_eq!(second.status, 200, "{}", second.text);
        assert_eq!(second.body["removed_vote_groups"], 0);

        let winner = app.get_with_token(&routes::entry(b), &admin).await;
        assert_eq!(winner.body["archive_rank"], 1);
        assert_eq!(winner.body["archive_score"], 1.0);
        let runner_up = app.get_with_token(&routes::entry(a), &admin).await;
        assert_eq!(runner_up.body["archive_rank"], 2);
        assert_eq!(runner_up.body["archive_score"], 0.5);
    }

    #[tokio::test]
    async fn requires_archive_manage() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let staff = app.create_user_with_role("sam", "securepass", "staff").await;

        let res = app
            .post_with_token(&routes::finalize_archive(event_id), &json!({}), &staff)
            .await;
        assert_eq!(res.status, 403);
    }
}

mod browsing {
    use super::*;

    #[tokio::test]
    async fn archive_page_is_public_only_after_archiving() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        app.create_compo(&admin, event_id, Phase::Closed).await;
        app.create_compo_with(
            &admin,
            event_id,
            Phase::Closed,
            json!({"name": "Secret", "hide_from_archive": true}),
        )
        .await;

        let hidden = app.get_without_token(&routes::archived_event(event_id)).await;
        assert_eq!(hidden.status, 404);
        let preview = app
            .get_with_token(&routes::archived_event(event_id), &admin)
            .await;
        assert_eq!(preview.status, 200, "{}", preview.text);

        let res = app
            .post_with_token(&routes::finalize_archive(event_id), &json!({}), &admin)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let list = app.get_without_token(routes::ARCHIVED_EVENTS).await;
        assert_eq!(list.body.as_array().unwrap().len(), 1);
        let detail = app.get_without_token(&routes::archived_event(event_id)).await;
        assert_eq!(detail.status, 200, "{}", detail.text);
        assert_eq!(detail.body["compos"].as_array().unwrap().len(), 1);

        let res = app.post_with_token(&unarchive(event_id), &json!({}), &admin).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["archived"], false);
        let hidden = app.get_without_token(&routes::archived_event(event_id)).await;
        assert_eq!(hidden.status, 404);
    }
}

mod videos {
    use super::*;

    #[tokio::test]
    async fn categories_hold_youtube_videos() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;

        let res = app
            .post_with_token(
                routes::VIDEO_CATEGORIES,
                &json!({"event_id": event_id, "name": "Seminars"}),
                &admin,
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        let category_id = res.id();

        let bad = app
            .post_with_token(
                routes::VIDEOS,
                &json!({
                    "category_id": category_id,
                    "name": "Keynote",
                    "youtube_url": "https://vimeo.com/123",
                }),
                &admin,
            )
            .await;
        assert_eq!(bad.status, 400);

        let ok = app
            .post_with_token(
                routes::VIDEOS,
                &json!({
                    "category_id": category_id,
                    "name": "Keynote",
                    "youtube_url": "https://www.youtube.com/watch?v=abc",
                }),
                &admin,
            )
            .await;
        assert_eq!(ok.status, 201, "{}", ok.text);

        let list = app
            .get_without_token(&format!("{}?event_id={event_id}", routes::VIDEO_CATEGORIES))
            .await;
        assert_eq!(list.status, 200, "{}", list.text);
        assert_eq!(list.body[0]["videos"][0]["name"], "Keynote");

        let res = app
            .delete_with_token(&routes::video_category(category_id), &admin)
            .await;
        assert_eq!(res.status, 204, "{}", res.text);
        let list = app
            .get_without_token(&format!("{}?event_id={event_id}", routes::VIDEO_CATEGORIES))
            .await;
        assert!(list.body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn video_needs_an_existing_category() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;

        let res = app
            .post_with_token(
                routes::VIDEOS,
                &json!({
                    "category_id": 999_999,
                    "name": "Keynote",
                    "youtube_url": "https://youtu.be/abc",
                }),
                &admin,
            )
            .await;
        assert_eq!(res.status, 404);
    }
}
