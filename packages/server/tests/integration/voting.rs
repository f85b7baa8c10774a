use serde_json::json;

use crate::common::{Phase, TestApp, order_body, routes};

/// Buy one ticket, mark it paid and return its key.
async fn paid_ticket_key(app: &TestApp, admin: &str, event_id: i32) -> String {
    let item_id = app.create_store_item(admin, event_id, json!({})).await;
    let order = app
        .post_without_token(
            routes::STORE_ORDERS,
            &order_body(json!([{"item_id": item_id, "amount": 1}])),
        )
        .await;
    assert_eq!(order.status, 201, "{}", order.text);
    let token = order.body["token"].as_str().unwrap().to_string();

    let tx = app.get_without_token(&routes::store_order(&token)).await;
    let paid = app
        .post_with_token(&routes::transaction_paid(tx.id()), &json!({}), admin)
        .await;
    assert_eq!(paid.status, 200, "{}", paid.text);
    paid.body["items"][0]["key"].as_str().unwrap().to_string()
}

mod vote_rights {
    use super::*;

    #[tokio::test]
    async fn ticket_key_prefix_grants_voting_rights_once() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let key = paid_ticket_key(&app, &admin, event_id).await;
        let alice = app.create_authenticated_user("alice", "securepass").await;
        let bob = app.create_authenticated_user("bob", "securepass").await;

        let res = app
            .post_with_token(
                &routes::vote_codes(event_id),
                &json!({"ticket_key": key[..10].to_uppercase()}),
                &alice,
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);

        let mine = app.get_with_token(&routes::my_vote_code(event_id), &alice).await;
        assert_eq!(mine.status, 200);

        let res = app
            .post_with_token(&routes::vote_codes(event_id), &json!({"ticket_key": key}), &bob)
            .await;
        assert_eq!(res.status, 409);
    }

    #[tokio::test]
    async fn short_or_unknown_keys_are_rejected() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let alice = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .post_with_token(&routes::vote_codes(event_id), &json!({"ticket_key": "abc"}), &alice)
            .await;
        assert_eq!(res.status, 400);

        let res = app
            .post_with_token(
                &routes::vote_codes(event_id),
                &json!({"ticket_key": "0123456789abcdef"}),
                &alice,
            )
            .await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn unpaid_ticket_does_not_grant_rights() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let item_id = app.create_store_item(&admin, event_id, json!({})).await;
        let order = app
            .post_without_token(
                routes::STORE_ORDERS,
                &order_body(json!([{"item_id": item_id, "amount": 1}])),
            )
            .await;
        assert_eq!(order.status, 201, "{}", order.text);
        // Managers see keys even before payment.
        let list = app
            .get_with_token(
                &format!("{}?event_id={event_id}", routes::STORE_TRANSACTIONS),
                &admin,
            )
            .await;
        assert_eq!(list.status, 200, "{}", list.text);
        let key = list.body["data"][0]["items"][0]["key"]
            .as_str()
            .unwrap()
            .to_string();
        let alice = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .post_with_token(&routes::vote_codes(event_id), &json!({"ticket_key": key}), &alice)
            .await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn vote_code_request_is_editable_until_decided() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let alice = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .post_with_token(
                &routes::vote_code_requests(event_id),
                &json!({"text": "Forgot my ticket"}),
                &alice,
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["status"], "pending");
        let request_id = res.id();

        let again = app
            .post_with_token(
                &routes::vote_code_requests(event_id),
                &json!({"text": "Again"}),
                &alice,
            )
            .await;
        assert_eq!(again.status, 409);

        let edited = app
            .patch_with_token(
                &routes::my_vote_code_request(event_id),
                &json!({"text": "At table 12"}),
                &alice,
            )
            .await;
        assert_eq!(edited.status, 200, "{}", edited.text);
        assert_eq!(edited.body["text"], "At table 12");

        let list = app
            .get_with_token(
                &format!("{}?status=pending", routes::vote_code_requests(event_id)),
                &admin,
            )
            .await;
        assert_eq!(list.status, 200, "{}", list.text);
        assert_eq!(list.body["pagination"]["total"], 1);

        let rejected = app
            .put_with_token(
                &routes::vote_code_request_status(request_id),
                &json!({"status": "rejected"}),
                &admin,
            )
            .await;
        assert_eq!(rejected.status, 200, "{}", rejected.text);

        let edit = app
            .patch_with_token(
                &routes::my_vote_code_request(event_id),
                &json!({"text": "Please"}),
                &alice,
            )
            .await;
        assert_eq!(edit.status, 409);
    }

    #[tokio::test]
    async fn accepted_request_grants_rights_and_is_frozen() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let compo_id = app.create_compo(&admin, event_id, Phase::Voting).await;
        let entry_id = app.create_entry(&admin, compo_id, "Alpha").await.id();
        let alice = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .post_with_token(
                &routes::vote_code_requests(event_id),
                &json!({"text": "Lost my ticket"}),
                &alice,
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        let accepted = app
            .put_with_token(
                &routes::vote_code_request_status(res.id()),
                &json!({"status": "accepted"}),
                &admin,
            )
            .await;
        assert_eq!(accepted.status, 200, "{}", accepted.text);

        let edit = app
            .patch_with_token(
                &routes::my_vote_code_request(event_id),
                &json!({"text": "Changed my mind"}),
                &alice,
            )
            .await;
        assert_eq!(edit.status, 409);
        let mine = app
            .get_with_token(&routes::my_vote_code_request(event_id), &alice)
            .await;
        assert_eq!(mine.body["text"], "Lost my ticket");
        assert_eq!(mine.body["status"], "accepted");

        let vote = app
            .put_with_token(&routes::compo_votes(compo_id), &json!({"entry_ids": [entry_id]}), &alice)
            .await;
        assert_eq!(vote.status, 200, "{}", vote.text);
    }

    #[tokio::test]
    async fn only_vote_managers_list_requests() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let alice = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .get_with_token(&routes::vote_code_requests(event_id), &alice)
            .await;
        assert_eq!(res.status, 403);
    }
}

mod ballots {
    use super::*;

    async fn voting_compo_with_entries(app: &TestApp, admin: &str) -> (i32, i32, Vec<i32>) {
        let event_id = app.create_event(admin, "Instanssi 2026").await;
        let compo_id = app.create_compo(admin, event_id, Phase::Voting).await;
        let mut entries = Vec::new();
        for name in ["Alpha", "Beta", "Gamma"] {
            let res = app.create_entry(admin, compo_id, name).await;
            assert_eq!(res.status, 201, "{}", res.text);
            entries.push(res.id());
        }
        (event_id, compo_id, entries)
    }

    #[tokio::test]
    async fn voting_requires_voting_rights() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let (_, compo_id, entries) = voting_compo_with_entries(&app, &admin).await;
        let alice = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .put_with_token(&routes::compo_votes(compo_id), &json!({"entry_ids": entries}), &alice)
            .await;

        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn ballots_rank_entries_by_inverse_rank_sum() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let (event_id, compo_id, entries) = voting_compo_with_entries(&app, &admin).await;
        let (a, b, c) = (entries[0], entries[1], entries[2]);

        let alice = app.create_authenticated_user("alice", "securepass").await;
        let bob = app.create_authenticated_user("bob", "securepass").await;
        app.grant_voting_rights(event_id, &alice, &admin).await;
        app.grant_voting_rights(event_id, &bob, &admin).await;

        // alice: b=1, a=1/2, c=1/3. bob: b=1, c=1/2.
        let res = app
            .put_with_token(&routes::compo_votes(compo_id), &json!({"entry_ids": [b, a, c]}), &alice)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        let res = app
            .put_with_token(&routes::compo_votes(compo_id), &json!({"entry_ids": [b, c]}), &bob)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let mine = app.get_with_token(&routes::my_votes(compo_id), &alice).await;
        assert_eq!(mine.body["entry_ids"], json!([b, a, c]));

        let results = app.get_with_token(&routes::compo_results(compo_id), &admin).await;
        assert_eq!(results.status, 200, "{}", results.text);
        let ids: Vec<i64> = results
            .body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![b as i64, c as i64, a as i64]);
        assert_eq!(results.body[0]["score"], 2.0);
        assert_eq!(results.body[0]["rank"], 1);

        let groups = app.get_with_token(&routes::vote_groups(compo_id), &admin).await;
        assert_eq!(groups.status, 200, "{}", groups.text);
    }

    #[tokio::test]
    async fn resubmitting_replaces_the_ballot() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let (event_id, compo_id, entries) = voting_compo_with_entries(&app, &admin).await;
        let alice = app.create_authenticated_user("alice", "securepass").await;
        app.grant_voting_rights(event_id, &alice, &admin).await;

        for ballot in [json!([entries[0]]), json!([entries[2], entries[1]])] {
            let res = app
                .put_with_token(&routes::compo_votes(compo_id), &json!({"entry_ids": ballot}), &alice)
                .await;
            assert_eq!(res.status, 200, "{}", res.text);
        }

        let mine = app.get_with_token(&routes::my_votes(compo_id), &alice).await;
        assert_eq!(mine.body["entry_ids"], json!([entries[2], entries[1]]));
    }

    #[tokio::test]
    async fn duplicate_or_foreign_entries_are_rejected() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let (event_id, compo_id, entries) = voting_compo_with_entries(&app, &admin).await;
        let alice = app.create_authenticated_user("alice", "securepass").await;
        app.grant_voting_rights(event_id, &alice, &admin).await;

        let dup = app
            .put_with_token(
                &routes::compo_votes(compo_id),
                &json!({"entry_ids": [entries[0], entries[0]]}),
                &alice,
            )
            .await;
        assert_eq!(dup.status, 400);

        let foreign = app
            .put_with_token(&routes::compo_votes(compo_id), &json!({"entry_ids": [999_999]}), &alice)
            .await;
        assert_eq!(foreign.status, 400);
    }

    #[tokio::test]
    async fn disqualified_entries_rank_last() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let (event_id, compo_id, entries) = voting_compo_with_entries(&app, &admin).await;
        let alice = app.create_authenticated_user("alice", "securepass").await;
        app.grant_voting_rights(event_id, &alice, &admin).await;

        let res = app
            .put_with_token(&routes::compo_votes(compo_id), &json!({"entry_ids": entries}), &alice)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        let res = app
            .post_with_token(
                &routes::entry_disqualify(entries[0]),
                &json!({"reason": "Rule violation"}),
                &admin,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let results = app.get_with_token(&routes::compo_results(compo_id), &admin).await;
        let last = results.body.as_array().unwrap().last().unwrap().clone();
        assert_eq!(last["id"], entries[0]);
        assert_eq!(last["score"], -1.0);
    }

    #[tokio::test]
    async fn archive_fields_override_results_until_cleared() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let (event_id, compo_id, entries) = voting_compo_with_entries(&app, &admin).await;
        let (a, c) = (entries[0], entries[2]);
        let alice = app.create_authenticated_user("alice", "securepass").await;
        app.grant_voting_rights(event_id, &alice, &admin).await;
        let res = app
            .put_with_token(&routes::compo_votes(compo_id), &json!({"entry_ids": entries}), &alice)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let result_of = |results: &serde_json::Value, id: i32| {
            results
                .as_array()
                .unwrap()
                .iter()
                .find(|r| r["id"] == id)
                .cloned()
                .unwrap()
        };

        let set = app
            .put_with_token(
                &routes::entry_archive(c),
                &json!({"archive_score": 5.0, "archive_rank": 1}),
                &admin,
            )
            .await;
        assert_eq!(set.status, 200, "{}", set.text);
        assert_eq!(set.body["archive_rank"], 1);

        let results = app.get_with_token(&routes::compo_results(compo_id), &admin).await;
        assert_eq!(results.status, 200, "{}", results.text);
        let overridden = result_of(&results.body, c);
        assert_eq!(overridden["score"], 5.0);
        assert_eq!(overridden["rank"], 1);
        assert_eq!(result_of(&results.body, a)["rank"], 1);
        assert_eq!(results.body.as_array().unwrap().last().unwrap()["rank"], 2);

        let cleared = app
            .put_with_token(
                &routes::entry_archive(c),
                &json!({"archive_score": null, "archive_rank": null}),
                &admin,
            )
            .await;
        assert_eq!(cleared.status, 200, "{}", cleared.text);
        assert!(cleared.body["archive_score"].is_null());

        let results = app.get_with_token(&routes::compo_results(compo_id), &admin).await;
        let live = result_of(&results.body, c);
        assert_eq!(live["rank"], 3);
        assert!((live["score"].as_f64().unwrap() - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(results.body[0]["id"], a);
    }

    #[tokio::test]
    async fn archive_rank_must_be_positive() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let (_, _, entries) = voting_compo_with_entries(&app, &admin).await;

        let res = app
            .put_with_token(&routes::entry_archive(entries[0]), &json!({"archive_rank": 0}), &admin)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn results_are_hidden_from_the_public_while_voting() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let (_, compo_id, _) = voting_compo_with_entries(&app, &admin).await;

        let res = app.get_without_token(&routes::compo_results(compo_id)).await;
        assert_eq!(res.status, 403);
    }
}
