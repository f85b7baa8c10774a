use serde_json::{Value, json};

use crate::common::{TestApp, hours_from_now, routes};

async fn create_competition(app: &TestApp, admin: &str, extra: Value) -> (i32, i32) {
    let event_id = app.create_event(admin, "Instanssi 2026").await;
    let mut body = json!({
        "event_id": event_id,
        "name": "Quake 3 tournament",
        "participation_end": hours_from_now(2),
        "start": hours_from_now(3),
    });
    if let (Some(base), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    let res = app.post_with_token(routes::COMPETITIONS, &body, admin).await;
    assert_eq!(res.status, 201, "create_competition failed: {}", res.text);
    (event_id, res.id())
}

async fn join(app: &TestApp, id: i32, token: &str, name: &str) -> i32 {
    let res = app
        .post_with_token(
            &routes::competition_participation(id),
            &json!({"participant_name": name}),
            token,
        )
        .await;
    assert_eq!(res.status, 201, "join failed: {}", res.text);
    res.id()
}

#[tokio::test]
async fn user_can_join_once_and_leave() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let (_, id) = create_competition(&app, &admin, json!({})).await;
    let alice = app.create_authenticated_user("alice", "securepass").await;

    join(&app, id, &alice, "alice").await;
    let again = app
        .post_with_token(
            &routes::competition_participation(id),
            &json!({"participant_name": "alice2"}),
            &alice,
        )
        .await;
    assert_eq!(again.status, 409);

    let left = app
        .delete_with_token(&routes::competition_participation(id), &alice)
        .await;
    assert_eq!(left.status, 204, "{}", left.text);
}

#[tokio::test]
async fn joining_after_participation_end_is_rejected() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let (_, id) = create_competition(
        &app,
        &admin,
        json!({"participation_end": hours_from_now(-1), "start": hours_from_now(-1)}),
    )
    .await;
    let alice = app.create_authenticated_user("alice", "securepass").await;

    let res = app
        .post_with_token(
            &routes::competition_participation(id),
            &json!({"participant_name": "alice"}),
            &alice,
        )
        .await;
    assert_eq!(res.status, 400);

    let detail = app.get_without_token(&routes::competition(id)).await;
    assert_eq!(detail.body["is_participation_open"], false);
}

#[tokio::test]
async fn end_before_start_is_rejected() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let (_, id) = create_competition(&app, &admin, json!({})).await;

    let res = app
        .patch_with_token(
            &routes::competition(id),
            &json!({"end": hours_from_now(1)}),
            &admin,
        )
        .await;
    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn lowest_score_wins_when_configured() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let (_, id) = create_competition(
        &app,
        &admin,
        json!({"score_sort": "lowest_first", "score_type": "s"}),
    )
    .await;
    let alice = app.create_authenticated_user("alice", "securepass").await;
    let bob = app.create_authenticated_user("bob", "securepass").await;
    let carol = app.create_authenticated_user("carol", "securepass").await;
    let pa = join(&app, id, &alice, "alice").await;
    let pb = join(&app, id, &bob, "bob").await;
    let pc = join(&app, id, &carol, "carol").await;

    for (p, score) in [(pa, 31.5), (pb, 28.0)] {
        let res = app
            .put_with_token(
                &routes::competition_participant(id, p),
                &json!({"score": score}),
                &admin,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
    }
    let res = app
        .put_with_token(
            &routes::competition_participant(id, pc),
            &json!({"score": 1.0, "disqualified": true, "disqualified_reason": "Cheating"}),
            &admin,
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text);

    let hidden = app.get_without_token(&routes::competition_results(id)).await;
    assert_eq!(hidden.status, 403);

    let res = app
        .patch_with_token(&routes::competition(id), &json!({"show_results": true}), &admin)
        .await;
    assert_eq!(res.status, 200, "{}", res.text);

    let results = app.get_without_token(&routes::competition_results(id)).await;
    assert_eq!(results.status, 200, "{}", results.text);
    let names: Vec<&str> = results
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["participant_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["bob", "alice", "carol"]);
    assert_eq!(results.body[0]["rank"], 1);
}

#[tokio::test]
async fn scores_must_be_set_by_managers() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let (_, id) = create_competition(&app, &admin, json!({})).await;
    let alice = app.create_authenticated_user("alice", "securepass").await;
    let p = join(&app, id, &alice, "alice").await;

    let res = app
        .put_with_token(
            &routes::competition_participant(id, p),
            &json!({"score": 100.0}),
            &alice,
        )
        .await;
    assert_eq!(res.status, 403);
}
