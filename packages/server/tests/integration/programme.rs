use serde_json::json;

use crate::common::{TestApp, hours_from_now, routes};

fn of_event(base: &str, event_id: i32) -> String {
    format!("{base}?event_id={event_id}")
}

mod programme {
    use super::*;

    #[tokio::test]
    async fn inactive_programme_events_are_hidden_from_the_public() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        for (title, start, active) in [
            ("Prizegiving", 20, true),
            ("Doors open", 1, true),
            ("Setup", 0, false),
        ] {
            let res = app
                .post_with_token(
                    routes::PROGRAMME,
                    &json!({
                        "event_id": event_id,
                        "title": title,
                        "start": hours_from_now(start),
                        "active": active,
                    }),
                    &admin,
                )
                .await;
            assert_eq!(res.status, 201, "{}", res.text);
        }

        let public = app
            .get_without_token(&of_event(routes::PROGRAMME, event_id))
            .await;
        assert_eq!(public.status, 200, "{}", public.text);
        let titles: Vec<&str> = public
            .body
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["Doors open", "Prizegiving"]);

        let managed = app
            .get_with_token(&of_event(routes::PROGRAMME, event_id), &admin)
            .await;
        assert_eq!(managed.body.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn programme_event_can_be_updated_and_deleted() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let res = app
            .post_with_token(
                routes::PROGRAMME,
                &json!({
                    "event_id": event_id,
                    "title": "Talk",
                    "start": hours_from_now(2),
                    "end": hours_from_now(3),
                }),
                &admin,
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        let id = res.id();

        let updated = app
            .patch_with_token(
                &routes::programme_event(id),
                &json!({"event_type": "detailed", "presenters": "Jane", "end": null}),
                &admin,
            )
            .await;
        assert_eq!(updated.status, 200, "{}", updated.text);
        assert_eq!(updated.body["event_type"], "detailed");
        assert!(updated.body["end"].is_null());

        let res = app.delete_with_token(&routes::programme_event(id), &admin).await;
        assert_eq!(res.status, 204);
        let res = app.delete_with_token(&routes::programme_event(id), &admin).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn end_before_start_is_rejected() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;

        let res = app
            .post_with_token(
                routes::PROGRAMME,
                &json!({
                    "event_id": event_id,
                    "title": "Backwards",
                    "start": hours_from_now(3),
                    "end": hours_from_now(2),
                }),
                &admin,
            )
            .await;
        assert_eq!(res.status, 400);
    }
}

mod calendar {
    use super::*;

    #[tokio::test]
    async fn ics_feed_lists_programme_and_calendar_entries() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let res = app
            .post_with_token(
                routes::PROGRAMME,
                &json!({"event_id": event_id, "title": "Demo compo", "start": hours_from_now(5)}),
                &admin,
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        let res = app
            .post_with_token(
                routes::CALENDAR,
                &json!({
                    "event_id": event_id,
                    "title": "Sauna",
                    "start": hours_from_now(6),
                    "location": "Basement",
                }),
                &admin,
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);

        let ics = app.get_without_token(&routes::event_calendar(event_id)).await;

        assert_eq!(ics.status, 200);
        assert!(ics.content_type.unwrap().starts_with("text/calendar"));
        assert!(ics.text.starts_with("BEGIN:VCALENDAR"));
        assert!(ics.text.contains("SUMMARY:Demo compo"));
        assert!(ics.text.contains("SUMMARY:Sauna"));
    }

    #[tokio::test]
    async fn calendar_entries_are_managed_by_programme_managers() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .post_with_token(
                routes::CALENDAR,
                &json!({"event_id": event_id, "title": "Sauna", "start": hours_from_now(6)}),
                &token,
            )
            .await;
        assert_eq!(res.status, 403);

        let list = app
            .get_without_token(&of_event(routes::CALENDAR, event_id))
            .await;
        assert_eq!(list.status, 200);
        assert!(list.body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_event_has_no_feed() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(&routes::event_calendar(999_999)).await;
        assert_eq!(res.status, 404);
    }
}

mod screenshow {
    use super::*;

    #[tokio::test]
    async fn only_currently_showing_messages_are_active() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        for (text, start, end) in [
            ("Now showing", -1, 1),
            ("Later", 2, 4),
            ("Expired", -3, -2),
        ] {
            let res = app
                .post_with_token(
                    routes::MESSAGES,
                    &json!({
                        "event_id": event_id,
                        "text": text,
                        "show_start": hours_from_now(start),
                        "show_end": hours_from_now(end),
                    }),
                    &admin,
                )
                .await;
            assert_eq!(res.status, 201, "{}", res.text);
        }

        let active = app
            .get_without_token(&of_event(routes::ACTIVE_MESSAGES, event_id))
            .await;
        assert_eq!(active.status, 200, "{}", active.text);
        assert_eq!(active.body.as_array().unwrap().len(), 1);
        assert_eq!(active.body[0]["text"], "Now showing");

        let all = app
            .get_with_token(&of_event(routes::MESSAGES, event_id), &admin)
            .await;
        assert_eq!(all.body.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn sponsor_url_must_be_http() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;

        let bad = app
            .post_with_token(
                routes::SPONSORS,
                &json!({"event_id": event_id, "name": "ACME", "url": "javascript:alert(1)"}),
                &admin,
            )
            .await;
        assert_eq!(bad.status, 400);

        let ok = app
            .post_with_token(
                routes::SPONSORS,
                &json!({"event_id": event_id, "name": "ACME", "url": "https://acme.example"}),
                &admin,
            )
            .await;
        assert_eq!(ok.status, 201, "{}", ok.text);

        let list = app
            .get_without_token(&of_event(routes::SPONSORS, event_id))
            .await;
        assert_eq!(list.body[0]["name"], "ACME");
    }
}
