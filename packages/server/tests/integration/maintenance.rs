use std::sync::Arc;

use serde_json::json;

use crate::common::{TestApp, routes};

mod image_cleanup {
    use super::*;

    #[tokio::test]
    async fn sweep_clears_only_broken_references() {
        let app = TestApp::spawn().await;
        let live = app.upload_jpeg("u1").await;

        let kept = app.create_entry("u1", json!({ "imageUrl": live })).await;
        let dangling = app
            .create_entry("u1", json!({ "imageUrl": "/images/0123456789abcdef01234567" }))
            .await;
        let malformed = app
            .create_entry("u2", json!({ "imageUrl": "https://example.com/x.png" }))
            .await;
        app.create_entry("u2", json!({})).await;

        let res = app.post(routes::IMAGE_CLEANUP, &json!({})).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(
            res.body,
            json!({ "cleanedCount": 2, "totalEntriesChecked": 3, "validImagesFound": 1 })
        );

        let kept = app.records.get(&kept, Some("u1")).await.unwrap().unwrap();
        assert_eq!(kept.image_url.as_deref(), Some(live.as_str()));
        for (id, user) in [(&dangling, "u1"), (&malformed, "u2")] {
            let entry = app.records.get(id, Some(user)).await.unwrap().unwrap();
            assert!(!entry.has_image(), "{id} still has an image");
        }
        assert_eq!(app.images.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_sweep_finds_nothing() {
        let app = TestApp::spawn().await;
        app.create_entry("u1", json!({ "imageUrl": "/images/0123456789abcdef01234567" }))
            .await;

        let first = app.post(routes::IMAGE_CLEANUP, &json!({})).await;
        assert_eq!(first.body["cleanedCount"], 1);

        let second = app.post(routes::IMAGE_CLEANUP, &json!({})).await;
        assert_eq!(second.body["cleanedCount"], 0);
    }

    #[tokio::test]
    async fn deleted_image_is_cleared_from_its_entry() {
        let app = TestApp::spawn().await;
        let url = app.upload_jpeg("u1").await;
        let id = app.create_entry("u1", json!({ "imageUrl": url })).await;

        app.delete(&url).await;
        let res = app.post(routes::IMAGE_CLEANUP, &json!({})).await;
        assert_eq!(res.body["cleanedCount"], 1);

        let entry = &app.get(&routes::entries_for("u1")).await.body[0];
        assert_eq!(entry["id"], id.as_str());
        assert!(entry["imageUrl"].as_str().unwrap_or_default().is_empty());
    }
}

mod summary {
    use super::*;

    #[tokio::test]
    async fn summary_reports_counts() {
        let app = TestApp::spawn().await;
        let url = app.upload_jpeg("u1").await;
        app.upload_jpeg("u1").await;
        app.create_entry("u1", json!({ "imageUrl": url })).await;
        app.create_entry("u1", json!({})).await;

        let res = app.get(routes::SUMMARY).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["repairEntries"]["total"], 2);
        assert_eq!(res.body["repairEntries"]["pending"], 2);
        assert_eq!(res.body["repairEntries"]["delivered"], 0);
        assert_eq!(res.body["images"]["total"], 2);
        assert_eq!(res.body["images"]["unreferenced"], 1);
        assert_eq!(res.body["backend"], "browser-local");
        assert!(res.body["timestamp"].as_str().is_some());
    }
}

mod storage_status {
    use server::records::{BrowserLocalStore, DocumentStore, RecordStore};

    use super::*;

    #[tokio::test]
    async fn reports_browser_local_primary() {
        let app = TestApp::spawn().await;

        let res = app.get(routes::STORAGE).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["active"], "browser-local");
        assert_eq!(res.body["label"], "Browser-local storage");
        assert_eq!(res.body["tiers"], json!(["browser-local"]));
    }

    #[tokio::test]
    async fn lists_every_tier_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let chain: Vec<Arc<dyn RecordStore>> = vec![
            Arc::new(DocumentStore::open(dir.path().to_path_buf()).await.unwrap()),
            Arc::new(BrowserLocalStore::in_memory()),
        ];
        let app = TestApp::spawn_with(chain).await;

        let res = app.get(routes::STORAGE).await;
        assert_eq!(res.body["active"], "local");
        assert_eq!(res.body["label"], "Local document database");
        assert_eq!(res.body["tiers"], json!(["local", "browser-local"]));

        let id = app.create_entry("u1", json!({})).await;
        assert_eq!(id.len(), 24, "document store ids are object ids");
    }
}
