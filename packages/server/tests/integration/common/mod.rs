use std::net::SocketAddr;
use std::sync::Arc;

use ::common::config::{StorageAppConfig, StorageBackendKind};
use ::common::storage::memory::MemoryBlobStore;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use server::config::{AppConfig, CorsConfig, ServerConfig, UploadConfig};
use server::state::AppState;

/// Chunk size limit used by every test server.
pub const MAX_CHUNK_SIZE: usize = 1024;

pub mod routes {
    pub const SESSIONS: &str = "/api/v1/sessions";

    pub fn session(id: &str) -> String {
        format!("/api/v1/sessions/{id}")
    }

    pub fn metadata(id: &str) -> String {
        format!("/api/v1/sessions/{id}/metadata")
    }

    pub fn status(id: &str) -> String {
        format!("/api/v1/sessions/{id}/status")
    }

    pub fn chunk(id: &str, chunk_number: u32) -> String {
        format!("/api/v1/sessions/{id}/chunks/{chunk_number}")
    }

    pub fn missing_chunks(id: &str) -> String {
        format!("/api/v1/sessions/{id}/missing-chunks")
    }
}

/// A running test server backed by an in-memory blob store.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub store: Arc<MemoryBlobStore>,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestResponse {
    async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.expect("Failed to read response body");
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        let app_config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors: CorsConfig {
                    allow_origins: vec![],
                    max_age: 3600,
                },
            },
            storage: StorageAppConfig {
                backend: StorageBackendKind::Memory,
                ..Default::default()
            },
            upload: UploadConfig {
                max_chunk_size: MAX_CHUNK_SIZE,
                ..Default::default()
            },
        };

        let store = Arc::new(MemoryBlobStore::default());
        let state = AppState::new(app_config, store.clone());
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
            store,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn send(&self, request: RequestBuilder) -> TestResponse {
        let res = request.send().await.expect("Failed to send request");
        TestResponse::from_response(res).await
    }

    fn as_user(request: RequestBuilder, user_id: &str) -> RequestBuilder {
        request
            .header("X-User-Id", user_id)
            .header("X-User-Email", format!("{user_id}@example.com"))
    }

    pub async fn get_as(&self, path: &str, user_id: &str) -> TestResponse {
        self.send(Self::as_user(self.client.get(self.url(path)), user_id))
            .await
    }

    pub async fn get_anonymous(&self, path: &str) -> TestResponse {
        self.send(self.client.get(self.url(path))).await
    }

    pub async fn post_as(&self, path: &str, body: &Value, user_id: &str) -> TestResponse {
        self.send(Self::as_user(self.client.post(self.url(path)), user_id).json(body))
            .await
    }

    pub async fn put_as(&self, path: &str, body: &Value, user_id: &str) -> TestResponse {
        self.send(Self::as_user(self.client.put(self.url(path)), user_id).json(body))
            .await
    }

    pub async fn patch_as(&self, path: &str, body: &Value, user_id: &str) -> TestResponse {
        self.send(Self::as_user(self.client.patch(self.url(path)), user_id).json(body))
            .await
    }

    pub async fn put_bytes_as(&self, path: &str, bytes: Vec<u8>, user_id: &str) -> TestResponse {
        self.send(
            Self::as_user(self.client.put(self.url(path)), user_id)
                .header("Content-Type", "audio/webm")
                .body(bytes),
        )
        .await
    }

    /// Create a session through the API and assert it succeeded.
    pub async fn create_session(&self, user_id: &str, session_id: &str, chunk_duration: u32) {
        let res = self
            .post_as(
                routes::SESSIONS,
                &serde_json::json!({
                    "session_id": session_id,
                    "chunk_duration": chunk_duration,
                }),
                user_id,
            )
            .await;
        assert_eq!(res.status, 201, "Create failed: {}", res.text);
    }
}
