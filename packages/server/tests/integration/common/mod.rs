use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tempfile::TempDir;

use ::common::storage::BlobStore;
use ::common::storage::filesystem::FilesystemBlobStore;
use server::config::{
    AppConfig, CorsConfig, ImagesConfig, ServerConfig, StorageBackend, StorageConfig,
};
use server::facade::StorageFacade;
use server::records::{BrowserLocalStore, RecordStore};
use server::state::AppState;

pub mod routes {
    pub const ENTRIES: &str = "/entries";
    pub const IMAGES: &str = "/images";
    pub const COMPANY: &str = "/company";
    pub const IMAGE_CLEANUP: &str = "/maintenance/image-cleanup";
    pub const SUMMARY: &str = "/maintenance/summary";
    pub const STORAGE: &str = "/storage";

    pub fn entries_for(user_id: &str) -> String {
        format!("/entries?userId={user_id}")
    }

    pub fn entry_stream(user_id: &str) -> String {
        format!("/entries/stream?userId={user_id}")
    }

    pub fn delete_entry(id: &str, user_id: &str) -> String {
        format!("/entries?id={id}&userId={user_id}")
    }

    pub fn deliver(id: &str) -> String {
        format!("/entries/{id}/deliver")
    }

    pub fn bill(id: &str, user_id: &str) -> String {
        format!("/entries/{id}/bill?userId={user_id}")
    }

    pub fn company_for(user_id: &str) -> String {
        format!("/company?userId={user_id}")
    }

    pub fn image(id: &str) -> String {
        format!("/images/{id}")
    }
}

/// A running test server.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub records: StorageFacade,
    pub images: Arc<dyn BlobStore>,
    _dir: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestApp {
    /// Server backed by an in-memory browser-local store.
    pub async fn spawn() -> Self {
        Self::spawn_with(vec![Arc::new(BrowserLocalStore::in_memory())]).await
    }

    /// Server whose façade uses exactly `chain`, primary first.
    pub async fn spawn_with(chain: Vec<Arc<dyn RecordStore>>) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");

        let app_config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors: CorsConfig::default(),
            },
            storage: StorageConfig {
                backend: StorageBackend::BrowserLocal,
                poll_interval_ms: 1000,
                cloud: None,
                local_dir: dir.path().join("local"),
                browser_dir: None,
            },
            images: ImagesConfig {
                dir: dir.path().join("images"),
            },
        };

        let records = StorageFacade::new(chain, Duration::from_millis(1000));
        let images: Arc<dyn BlobStore> = Arc::new(
            FilesystemBlobStore::new(app_config.images.dir.clone())
                .await
                .expect("Failed to open image store"),
        );

        let state = AppState {
            config: app_config,
            records: records.clone(),
            images: images.clone(),
        };

        let app = server::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            records,
            images,
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut req = self.client.get(self.url(path));
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let res = req.send().await.expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    /// Fetch raw bytes along with the status and headers.
    pub async fn get_bytes(&self, path: &str) -> (u16, HeaderMap, Vec<u8>) {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");
        let status = res.status().as_u16();
        let headers = res.headers().clone();
        let bytes = res.bytes().await.expect("Failed to read body").to_vec();
        (status, headers, bytes)
    }

    pub async fn post(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send PUT request");

        TestResponse::from_response(res).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    /// Multipart upload to `POST /images`. `None` fields are left out of the form.
    pub async fn upload_image(
        &self,
        file: Option<(&str, &str, Vec<u8>)>,
        user_id: Option<&str>,
        entry_id: Option<&str>,
    ) -> TestResponse {
        let mut form = reqwest::multipart::Form::new();
        if let Some((file_name, mime, bytes)) = file {
            let part = reqwest::multipart::Part::bytes(bytes)
                .file_name(file_name.to_string())
                .mime_str(mime)
                .expect("Failed to set MIME type");
            form = form.part("file", part);
        }
        if let Some(user_id) = user_id {
            form = form.text("userId", user_id.to_string());
        }
        if let Some(entry_id) = entry_id {
            form = form.text("entryId", entry_id.to_string());
        }

        let res = self
            .client
            .post(self.url(routes::IMAGES))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }

    /// Create an entry via the API and return its `id`.
    pub async fn create_entry(&self, user_id: &str, extra: Value) -> String {
        let mut body = serde_json::json!({
            "userId": user_id,
            "customerName": "Ravi Kumar",
            "contactNumber": "9876543210",
            "address": "12 MG Road",
            "bikeType": "Scooter",
            "bikeModel": "Activa 6G",
            "numberPlate": "KA01AB1234",
            "repairType": "General service",
            "entryDate": "2024-05-01",
            "expectedDeliveryDate": "2024-05-03",
            "advancecash": "100",
        });
        if let (Some(base), Value::Object(extra)) = (body.as_object_mut(), extra) {
            base.extend(extra);
        }

        let res = self.post(routes::ENTRIES, &body).await;
        assert_eq!(res.status, 201, "create_entry failed: {}", res.text);
        res.id()
    }

    /// Upload a small JPEG for `user_id` and return its `imageUrl`.
    pub async fn upload_jpeg(&self, user_id: &str) -> String {
        let res = self
            .upload_image(
                Some(("bike.jpg", "image/jpeg", b"\xFF\xD8\xFFjpeg-bytes".to_vec())),
                Some(user_id),
                None,
            )
            .await;
        assert_eq!(res.status, 201, "upload failed: {}", res.text);
        res.body["imageUrl"].as_str().unwrap().to_string()
    }

    /// Save a company profile for `user_id`.
    pub async fn save_company(&self, user_id: &str) -> TestResponse {
        let res = self
            .put(
                routes::COMPANY,
                &serde_json::json!({
                    "userId": user_id,
                    "companyName": "Speed Motors",
                    "address": "4 Ring Road",
                    "owner1Name": "Anil",
                    "owner1Phone": "9000000001",
                    "vehicleType": "bike",
                }),
            )
            .await;
        assert_eq!(res.status, 200, "save_company failed: {}", res.text);
        res
    }
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let headers = res.headers().clone();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self {
            status,
            headers,
            text,
            body,
        }
    }

    pub fn id(&self) -> String {
        self.body["id"]
            .as_str()
            .expect("response body should contain 'id'")
            .to_string()
    }

    pub fn error_code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }
}
