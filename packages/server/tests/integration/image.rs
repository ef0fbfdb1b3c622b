use ::common::image::MAX_IMAGE_SIZE;

use crate::common::{TestApp, routes};

const JPEG: &[u8] = b"\xFF\xD8\xFFjpeg-bytes";

mod image_upload {
    use super::*;

    #[tokio::test]
    async fn upload_returns_id_and_reference() {
        let app = TestApp::spawn().await;

        let res = app
            .upload_image(Some(("bike.jpg", "image/jpeg", JPEG.to_vec())), Some("u1"), None)
            .await;
        assert_eq!(res.status, 201, "{}", res.text);

        let id = res.body["imageId"].as_str().unwrap();
        assert_eq!(id.len(), 24);
        assert_eq!(res.body["imageUrl"], format!("/images/{id}"));
    }

    #[tokio::test]
    async fn same_bytes_get_distinct_ids() {
        let app = TestApp::spawn().await;

        let a = app.upload_jpeg("u1").await;
        let b = app.upload_jpeg("u1").await;
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn missing_file_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app.upload_image(None, Some("u1"), None).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["message"], "No file uploaded");
    }

    #[tokio::test]
    async fn missing_user_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .upload_image(Some(("bike.jpg", "image/jpeg", JPEG.to_vec())), None, None)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["message"], "User ID required");
        assert!(app.images.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn gif_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .upload_image(Some(("anim.gif", "image/gif", b"GIF89a".to_vec())), Some("u1"), None)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(
            res.body["message"],
            "Please select a valid image file (JPEG, PNG, or WebP)"
        );
    }

    #[tokio::test]
    async fn oversized_image_is_rejected_and_not_stored() {
        let app = TestApp::spawn().await;
        let big = vec![0u8; MAX_IMAGE_SIZE as usize + 1];

        let res = app
            .upload_image(Some(("huge.png", "image/png", big)), Some("u1"), None)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["message"], "Image size must be less than 5MB");
        assert!(app.images.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn image_at_exact_limit_is_accepted() {
        let app = TestApp::spawn().await;
        let exact = vec![0u8; MAX_IMAGE_SIZE as usize];

        let res = app
            .upload_image(Some(("full.png", "image/png", exact)), Some("u1"), None)
            .await;
        assert_eq!(res.status, 201, "{}", res.text);

        let stored = app.images.list_all().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].metadata.size, MAX_IMAGE_SIZE);
    }

    #[tokio::test]
    async fn second_file_part_is_rejected() {
        let app = TestApp::spawn().await;
        let part = |name: &str| {
            reqwest::multipart::Part::bytes(JPEG.to_vec())
                .file_name(name.to_string())
                .mime_str("image/jpeg")
                .unwrap()
        };
        let form = reqwest::multipart::Form::new()
            .part("file", part("a.jpg"))
            .part("file", part("b.jpg"))
            .text("userId", "u1");

        let res = app
            .client
            .post(app.url(routes::IMAGES))
            .multipart(form)
            .send()
            .await
            .unwrap();
        let res = crate::common::TestResponse::from_response(res).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["message"], "Only one file may be uploaded");
        assert!(app.images.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn entry_id_defaults_to_temp() {
        let app = TestApp::spawn().await;
        app.upload_jpeg("u1").await;
        app.upload_image(
            Some(("b.png", "image/png", b"png".to_vec())),
            Some("u1"),
            Some("entry-7"),
        )
        .await;

        let mut entry_ids: Vec<String> = app
            .images
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.metadata.entry_id)
            .collect();
        entry_ids.sort();
        assert_eq!(entry_ids, vec!["entry-7".to_string(), "temp".to_string()]);
    }
}

mod image_fetch {
    use super::*;

    #[tokio::test]
    async fn get_returns_bytes_with_cache_headers() {
        let app = TestApp::spawn().await;
        let url = app.upload_jpeg("u1").await;

        let (status, headers, bytes) = app.get_bytes(&url).await;
        assert_eq!(status, 200);
        assert_eq!(bytes, JPEG);
        assert_eq!(headers["content-type"], "image/jpeg");
        assert_eq!(headers["content-length"], JPEG.len().to_string().as_str());
        assert!(
            headers["cache-control"]
                .to_str()
                .unwrap()
                .contains("max-age=31536000")
        );
    }

    #[tokio::test]
    async fn matching_etag_is_not_modified() {
        let app = TestApp::spawn().await;
        let url = app.upload_jpeg("u1").await;

        let first = app.get(&url).await;
        let etag = first.headers["etag"].to_str().unwrap().to_string();

        let res = app
            .get_with_headers(&url, &[("if-none-match", etag.as_str())])
            .await;
        assert_eq!(res.status, 304);
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids_are_not_found() {
        let app = TestApp::spawn().await;

        let res = app.get(&routes::image("deadbeefdeadbeefdeadbeef")).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.error_code(), "NOT_FOUND");

        let res = app.get(&routes::image("not-an-id")).await;
        assert_eq!(res.status, 404);
    }
}

mod image_delete {
    use super::*;

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let app = TestApp::spawn().await;
        let url = app.upload_jpeg("u1").await;

        let res = app.delete(&url).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["success"], true);
        assert_eq!(app.get(&url).await.status, 404);
    }

    #[tokio::test]
    async fn delete_unknown_id_succeeds() {
        let app = TestApp::spawn().await;

        let res = app.delete(&routes::image("deadbeefdeadbeefdeadbeef")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["success"], true);

        let res = app.delete(&routes::image("garbage")).await;
        assert_eq!(res.status, 200);
    }
}
