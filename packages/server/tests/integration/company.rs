use serde_json::json;

use crate::common::{TestApp, routes};

mod company_profile {
    use super::*;

    #[tokio::test]
    async fn missing_profile_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app.get(&routes::company_for("u1")).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body["message"], "Company details not found");
    }

    #[tokio::test]
    async fn save_then_get() {
        let app = TestApp::spawn().await;
        let saved = app.save_company("u1").await;
        assert_eq!(saved.body["companyName"], "Speed Motors");

        let res = app.get(&routes::company_for("u1")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["owner1Name"], "Anil");
        assert!(res.body.get("owner2Name").is_none());
    }

    #[tokio::test]
    async fn resave_keeps_created_at() {
        let app = TestApp::spawn().await;
        let first = app.save_company("u1").await;
        let second = app.save_company("u1").await;

        assert_eq!(first.body["createdAt"], second.body["createdAt"]);
    }

    #[tokio::test]
    async fn required_fields_are_enforced() {
        let app = TestApp::spawn().await;

        let res = app
            .put(
                routes::COMPANY,
                &json!({ "userId": "u1", "companyName": "Speed Motors" }),
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.error_code(), "VALIDATION_ERROR");
    }
}

mod bill {
    use super::*;

    async fn delivered_entry(app: &TestApp, part_count: usize) -> String {
        let id = app.create_entry("u1", json!({})).await;
        let parts: Vec<_> = (0..part_count)
            .map(|i| json!({ "description": format!("Part {i}"), "quantity": 1, "price": 10 }))
            .collect();
        let res = app
            .post(
                &routes::deliver(&id),
                &json!({ "userId": "u1", "deliveryDate": "2024-05-03", "parts": parts }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        id
    }

    #[tokio::test]
    async fn bill_for_delivered_entry() {
        let app = TestApp::spawn().await;
        app.save_company("u1").await;
        let id = delivered_entry(&app, 3).await;

        let res = app.get(&routes::bill(&id, "u1")).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["header"]["companyName"], "Speed Motors");
        assert_eq!(res.body["vehicle"]["heading"], "Bike Information");
        assert_eq!(res.body["pages"].as_array().unwrap().len(), 1);
        assert_eq!(res.body["summary"]["totalAmount"], "30.00");
        assert_eq!(res.body["summary"]["advanceCash"], "100.00");
        assert_eq!(res.body["summary"]["finalAmount"], "-70.00");
    }

    #[tokio::test]
    async fn long_parts_list_spans_pages() {
        let app = TestApp::spawn().await;
        app.save_company("u1").await;
        let id = delivered_entry(&app, 26).await;

        let res = app.get(&routes::bill(&id, "u1")).await;
        let pages = res.body["pages"].as_array().unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0]["rows"].as_array().unwrap().len(), 5);
        assert_eq!(pages[1]["rows"].as_array().unwrap().len(), 20);
        assert_eq!(pages[2]["rows"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pending_entry_has_no_bill() {
        let app = TestApp::spawn().await;
        app.save_company("u1").await;
        let id = app.create_entry("u1", json!({})).await;

        let res = app.get(&routes::bill(&id, "u1")).await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn bill_needs_company_profile() {
        let app = TestApp::spawn().await;
        let id = delivered_entry(&app, 1).await;

        let res = app.get(&routes::bill(&id, "u1")).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body["message"], "Company details not found");
    }
}
