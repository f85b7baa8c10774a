use serde_json::json;

use crate::common::{TestApp, order_body, routes};

fn items_of(event_id: i32) -> String {
    format!("{}?event_id={event_id}", routes::STORE_ITEMS)
}

mod items {
    use super::*;

    #[tokio::test]
    async fn secret_items_need_the_key_to_be_listed() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        app.create_store_item(&admin, event_id, json!({})).await;
        app.create_store_item(
            &admin,
            event_id,
            json!({"name": "Backstage pass", "is_secret": true, "secret_key": "letmein"}),
        )
        .await;

        let public = app.get_without_token(&items_of(event_id)).await;
        assert_eq!(public.status, 200, "{}", public.text);
        assert_eq!(public.body.as_array().unwrap().len(), 1);

        let with_key = app
            .get_without_token(&format!("{}&secret_key=letmein", items_of(event_id)))
            .await;
        assert_eq!(with_key.body.as_array().unwrap().len(), 2);
        for item in with_key.body.as_array().unwrap() {
            assert!(item["secret_key"].is_null());
        }
    }

    #[tokio::test]
    async fn regular_user_cannot_create_items() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .post_with_token(
                routes::STORE_ITEMS,
                &json!({"event_id": event_id, "name": "Ticket", "price": 100, "max": 1}),
                &token,
            )
            .await;
        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn absurd_prices_are_rejected() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;

        for price in [-1_i64, 100_000_001, i64::MAX] {
            let res = app
                .post_with_token(
                    routes::STORE_ITEMS,
                    &json!({"event_id": event_id, "name": "Ticket", "price": price, "max": 1}),
                    &admin,
                )
                .await;
            assert_eq!(res.status, 400, "accepted price {price}");
            assert_eq!(res.body["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn ordered_item_cannot_be_deleted() {
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

        let res = app.delete_with_token(&routes::store_item(item_id), &admin).await;
        assert_eq!(res.status, 409);
    }
}

mod orders {
    use super::*;

    #[tokio::test]
    async fn order_applies_bulk_discount_and_reserves_stock() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let item_id = app
            .create_store_item(
                &admin,
                event_id,
                json!({"price": 1000, "max": 5, "discount_amount": 3, "discount_percentage": 15}),
            )
            .await;

        let res = app
            .post_without_token(
                routes::STORE_ORDERS,
                &order_body(json!([{"item_id": item_id, "amount": 3}])),
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["total_price"], 2550);

        let order = app
            .get_without_token(&routes::store_order(res.body["token"].as_str().unwrap()))
            .await;
        assert_eq!(order.status, 200, "{}", order.text);
        assert_eq!(order.body["items"].as_array().unwrap().len(), 3);
        assert_eq!(order.body["is_paid"], false);
        // Keys stay hidden until payment.
        assert!(order.body["items"][0]["key"].is_null());

        let items = app.get_without_token(&items_of(event_id)).await;
        assert_eq!(items.body[0]["num_available"], 2);
    }

    #[tokio::test]
    async fn order_beyond_stock_is_rejected() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let item_id = app
            .create_store_item(&admin, event_id, json!({"max": 2}))
            .await;

        let res = app
            .post_without_token(
                routes::STORE_ORDERS,
                &order_body(json!([{"item_id": item_id, "amount": 3}])),
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn item_with_variants_requires_one() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let res = app
            .post_with_token(
                routes::STORE_ITEMS,
                &json!({
                    "event_id": event_id,
                    "name": "T-shirt",
                    "price": 1500,
                    "max": 50,
                    "variants": ["S", "M"],
                }),
                &admin,
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        let item_id = res.id();
        let variant_id = res.body["variants"][1]["id"].as_i64().unwrap();

        let missing = app
            .post_without_token(
                routes::STORE_ORDERS,
                &order_body(json!([{"item_id": item_id, "amount": 1}])),
            )
            .await;
        assert_eq!(missing.status, 400);

        let ok = app
            .post_without_token(
                routes::STORE_ORDERS,
                &order_body(json!([{"item_id": item_id, "variant_id": variant_id, "amount": 1}])),
            )
            .await;
        assert_eq!(ok.status, 201, "{}", ok.text);
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let event_id = app.create_event(&admin, "Instanssi 2026").await;
        let item_id = app.create_store_item(&admin, event_id, json!({})).await;

        let mut body = order_body(json!([{"item_id": item_id, "amount": 1}]));
        body["email"] = json!("not-an-email");
        let res = app.post_without_token(routes::STORE_ORDERS, &body).await;
        assert_eq!(res.status, 400);
    }
}

mod transactions {
    use super::*;

    async fn order_one(app: &TestApp, admin: &str) -> (i32, String) {
        let event_id = app.create_event(admin, "Instanssi 2026").await;
        let item_id = app.create_store_item(admin, event_id, json!({})).await;
        let res = app
            .post_without_token(
                routes::STORE_ORDERS,
                &order_body(json!([{"item_id": item_id, "amount": 1}])),
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        let token = res.body["token"].as_str().unwrap().to_string();
        let order = app.get_without_token(&routes::store_order(&token)).await;
        (order.id(), token)
    }

    #[tokio::test]
    async fn paid_order_reveals_keys_and_can_be_delivered_once() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let (id, token) = order_one(&app, &admin).await;

        let paid = app
            .post_with_token(&routes::transaction_paid(id), &json!({}), &admin)
            .await;
        assert_eq!(paid.status, 200, "{}", paid.text);
        assert_eq!(paid.body["is_paid"], true);

        let order = app.get_without_token(&routes::store_order(&token)).await;
        let key = order.body["items"][0]["key"].as_str().unwrap().to_string();

        let delivered = app
            .post_with_token(&routes::deliver_item(&key), &json!({}), &admin)
            .await;
        assert_eq!(delivered.status, 200, "{}", delivered.text);
        assert!(delivered.body["time_delivered"].is_string());

        let again = app
            .post_with_token(&routes::deliver_item(&key), &json!({}), &admin)
            .await;
        assert_eq!(again.status, 409);
    }

    #[tokio::test]
    async fn paid_order_cannot_be_cancelled() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let (id, _) = order_one(&app, &admin).await;

        let paid = app
            .post_with_token(&routes::transaction_paid(id), &json!({}), &admin)
            .await;
        assert_eq!(paid.status, 200, "{}", paid.text);

        let res = app
            .post_with_token(&routes::transaction_cancel(id), &json!({}), &admin)
            .await;
        assert_eq!(res.status, 409);
    }

    #[tokio::test]
    async fn cancelled_order_frees_stock_and_cannot_be_paid() {
        let app = TestApp::spawn().await;
        let admin = app.admin().await;
        let (id, _) = order_one(&app, &admin).await;

        let cancelled = app
            .post_with_token(&routes::transaction_cancel(id), &json!({}), &admin)
            .await;
        assert_eq!(cancelled.status, 200, "{}", cancelled.text);
        assert_eq!(cancelled.body["is_cancelled"], true);

        let res = app
            .post_with_token(&routes::transaction_paid(id), &json!({}), &admin)
            .await;
        assert_eq!(res.status, 409);

        let items = app
            .get_without_token(&items_of(cancelled.body["event_id"].as_i64().unwrap() as i32))
            .await;
        assert_eq!(items.body[0]["num_available"], 10);
    }

    #[tokio::test]
    async fn listing_transactions_requires_store_manage() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice", "securepass").await;

        let res = app
            .get_with_token(&format!("{}?event_id=1", routes::STORE_TRANSACTIONS), &token)
            .await;
        assert_eq!(res.status, 403);
    }
}
