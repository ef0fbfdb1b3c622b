use serde_json::json;

use crate::common::{TestApp, routes};

mod entry_crud {
    use super::*;

    #[tokio::test]
    async fn create_then_list_returns_the_entry_once() {
        let app = TestApp::spawn().await;
        let id = app.create_entry("u1", json!({})).await;

        let res = app.get(&routes::entries_for("u1")).await;
        assert_eq!(res.status, 200);
        let entries = res.body.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["id"], id.as_str());
        assert_eq!(entries[0]["status"], "pending");
        assert_eq!(entries[0]["totalAmount"], "0");
        assert_eq!(entries[0]["parts"], json!([]));
        assert!(entries[0]["createdAt"].as_str().is_some());
    }

    #[tokio::test]
    async fn create_without_user_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .post(routes::ENTRIES, &json!({ "customerName": "Nobody" }))
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.error_code(), "VALIDATION_ERROR");
        assert_eq!(res.body["message"], "User ID required");
    }

    #[tokio::test]
    async fn create_with_malformed_json_is_a_validation_error() {
        let app = TestApp::spawn().await;

        let res = app
            .client
            .post(app.url(routes::ENTRIES))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn list_requires_user_id() {
        let app = TestApp::spawn().await;

        let res = app.get(routes::ENTRIES).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["message"], "User ID required");
    }

    #[tokio::test]
    async fn list_only_returns_own_entries() {
        let app = TestApp::spawn().await;
        app.create_entry("u1", json!({})).await;
        app.create_entry("u2", json!({})).await;

        let res = app.get(&routes::entries_for("u2")).await;
        assert_eq!(res.body.as_array().unwrap().len(), 1);
        assert_eq!(res.body[0]["userId"], "u2");
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let app = TestApp::spawn().await;
        let id = app.create_entry("u1", json!({})).await;

        let res = app
            .put(
                routes::ENTRIES,
                &json!({ "id": id, "userId": "u1", "repairType": "Engine overhaul" }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body, json!({ "success": true }));

        let entry = &app.get(&routes::entries_for("u1")).await.body[0];
        assert_eq!(entry["repairType"], "Engine overhaul");
        assert_eq!(entry["customerName"], "Ravi Kumar");
        assert_eq!(entry["numberPlate"], "KA01AB1234");
    }

    #[tokio::test]
    async fn update_without_id_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .put(routes::ENTRIES, &json!({ "repairType": "x" }))
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["message"], "Entry ID required");
    }

    #[tokio::test]
    async fn update_of_unknown_entry_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app
            .put(
                routes::ENTRIES,
                &json!({ "id": "12345", "userId": "u1", "repairType": "x" }),
            )
            .await;
        assert_eq!(res.status, 404);
        assert_eq!(res.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let app = TestApp::spawn().await;
        let id = app.create_entry("u1", json!({})).await;

        let first = app.delete(&routes::delete_entry(&id, "u1")).await;
        assert_eq!(first.status, 200);
        assert_eq!(first.body, json!({ "success": true }));

        let second = app.delete(&routes::delete_entry(&id, "u1")).await;
        assert_eq!(second.status, 200);

        let res = app.get(&routes::entries_for("u1")).await;
        assert!(res.body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_without_id_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app.delete(routes::ENTRIES).await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn delete_removes_the_entry_image_in_the_background() {
        let app = TestApp::spawn().await;
        let image_url = app.upload_jpeg("u1").await;
        let id = app
            .create_entry("u1", json!({ "imageUrl": image_url }))
            .await;

        let res = app.delete(&routes::delete_entry(&id, "u1")).await;
        assert_eq!(res.status, 200);

        let mut status = 200;
        for _ in 0..50 {
            status = app.get(&image_url).await.status;
            if status == 404 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(status, 404);
    }
}

mod delivery {
    use super::*;

    fn parts() -> serde_json::Value {
        json!([
            { "description": "Brake Pad", "quantity": 2, "price": 150 },
            { "description": "Engine Oil", "quantity": 1, "price": 300 },
        ])
    }

    #[tokio::test]
    async fn deliver_computes_totals() {
        let app = TestApp::spawn().await;
        let id = app.create_entry("u1", json!({})).await;

        let res = app
            .post(
                &routes::deliver(&id),
                &json!({
                    "userId": "u1",
                    "deliveryDate": "2024-05-03",
                    "parts": parts(),
                    "paymentMethod": "cash",
                }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "delivered");
        assert_eq!(res.body["totalAmount"], "600.00");
        assert_eq!(res.body["finalAmount"], "500.00");
        assert_eq!(res.body["paymentMethod"], "cash");
        assert_eq!(res.body["parts"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn deliver_with_zero_price_changes_nothing() {
        let app = TestApp::spawn().await;
        let id = app.create_entry("u1", json!({})).await;

        let res = app
            .post(
                &routes::deliver(&id),
                &json!({
                    "userId": "u1",
                    "deliveryDate": "2024-05-03",
                    "parts": [{ "description": "Labour", "quantity": 1, "price": 0 }],
                }),
            )
            .await;
        assert_eq!(res.status, 400);

        let entry = &app.get(&routes::entries_for("u1")).await.body[0];
        assert_eq!(entry["status"], "pending");
        assert_eq!(entry["parts"], json!([]));
    }

    #[tokio::test]
    async fn deliver_twice_is_rejected() {
        let app = TestApp::spawn().await;
        let id = app.create_entry("u1", json!({})).await;
        let body = json!({ "userId": "u1", "deliveryDate": "2024-05-03", "parts": parts() });

        assert_eq!(app.post(&routes::deliver(&id), &body).await.status, 200);
        let again = app.post(&routes::deliver(&id), &body).await;
        assert_eq!(again.status, 400);
    }

    #[tokio::test]
    async fn deliver_unknown_entry_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app
            .post(
                &routes::deliver("999"),
                &json!({ "userId": "u1", "deliveryDate": "2024-05-03", "parts": parts() }),
            )
            .await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn status_cannot_move_back_to_pending() {
        let app = TestApp::spawn().await;
        let id = app.create_entry("u1", json!({})).await;
        app.post(
            &routes::deliver(&id),
            &json!({ "userId": "u1", "deliveryDate": "2024-05-03", "parts": parts() }),
        )
        .await;

        let res = app
            .put(
                routes::ENTRIES,
                &json!({ "id": id, "userId": "u1", "status": "pending" }),
            )
            .await;
        assert_eq!(res.status, 400);
    }
}

mod stream {
    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn stream_requires_user_id() {
        let app = TestApp::spawn().await;

        let res = app.get("/entries/stream").await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn stream_sends_current_entries_first() {
        let app = TestApp::spawn().await;
        let id = app.create_entry("u1", json!({})).await;

        let res = app
            .client
            .get(app.url(&routes::entry_stream("u1")))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 200);
        assert!(
            res.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );

        let mut body = res.bytes_stream();
        let mut received = String::new();
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        while !received.contains("\n\n") {
            let chunk = tokio::time::timeout_at(deadline, body.next())
                .await
                .expect("no event before deadline")
                .expect("stream ended")
                .unwrap();
            received.push_str(&String::from_utf8_lossy(&chunk));
        }

        assert!(received.contains("event: entries"), "{received}");
        assert!(received.contains(&id), "{received}");
    }
}
