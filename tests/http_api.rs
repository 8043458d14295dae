//! End-to-end HTTP tests.
//!
//! Each test starts the real router on a free port with a SQLite store in a
//! temp directory. The embedding and generation APIs are played by
//! `wiremock` servers speaking the Jina and Gemini wire formats.

use std::sync::Arc;
use std::time::Duration;

use docsage::config::{Config, LimitsConfig};
use docsage::embedding::HttpEmbeddingProvider;
use docsage::generation::GeminiProvider;
use docsage::rag::RagService;
use docsage::server;
use docsage::store::sqlite::SqliteStore;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ─── Test infrastructure ────────────────────────────────────────────

struct TestApp {
    base: String,
    client: reqwest::Client,
    embedding: MockServer,
    generation: MockServer,
    handle: tokio::task::JoinHandle<()>,
    _tmp: TempDir,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

async fn start_app(limits: LimitsConfig) -> TestApp {
    let tmp = TempDir::new().unwrap();
    let mut cfg = Config::default();
    cfg.db.path = tmp.path().join("docs.db");

    let embedding = MockServer::start().await;
    let generation = MockServer::start().await;

    let store = SqliteStore::open(&cfg).await.unwrap();
    let embedder = HttpEmbeddingProvider::new(
        format!("{}/v1/embeddings", embedding.uri()),
        "test-embed",
        "secret",
        Duration::from_secs(5),
        None,
    )
    .unwrap();
    let generator =
        GeminiProvider::new(generation.uri(), "gemini-test", "k3y", Duration::from_secs(5))
            .unwrap();

    let service = Arc::new(RagService::new(
        Arc::new(store),
        Arc::new(embedder),
        Arc::new(generator),
        limits,
    ));

    let port = find_free_port();
    let bind = format!("127.0.0.1:{}", port);
    let handle = tokio::spawn(async move {
        server::serve(service, &bind).await.ok();
    });
    wait_for_server(port).await;

    TestApp {
        base: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        embedding,
        generation,
        handle,
        _tmp: tmp,
    }
}

impl TestApp {
    /// Embed `text` to `vector`, expecting exactly `times` requests.
    async fn embeds(&self, text: &str, vector: &[f32], times: u64) {
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(body_partial_json(json!({ "input": [text] })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": [ { "embedding": vector } ] })),
            )
            .expect(times)
            .mount(&self.embedding)
            .await;
    }

    async fn answers(&self, answer: &str, times: u64) {
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-test:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [ { "content": { "parts": [ { "text": answer } ] } } ]
            })))
            .expect(times)
            .mount(&self.generation)
            .await;
    }

    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> (u16, Value) {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let resp = self
            .client
            .post(format!("{}/upload", self.base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn get(&self, path_and_query: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(format!("{}{}", self.base, path_and_query))
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_list_and_query() {
    let app = start_app(LimitsConfig::default()).await;
    app.embeds("Rust ownership and borrowing", &[1.0, 0.0], 1).await;
    app.embeds("Python decorators", &[0.0, 1.0], 1).await;
    app.embeds("tell me about ownership", &[0.9, 0.1], 1).await;
    app.answers("Ownership is covered in [id=1].", 1).await;

    let (status, body) = app
        .upload("rust.txt", b"Rust ownership and borrowing".to_vec())
        .await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["message"], "Document uploaded successfully");
    assert_eq!(body["doc_id"], 1);
    assert_eq!(body["filename"], "rust.txt");

    let (status, body) = app.upload("python.md", b"Python decorators".to_vec()).await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["doc_id"], 2);

    let (status, body) = app.get("/documents").await;
    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!([ { "id": 1, "title": "rust.txt" }, { "id": 2, "title": "python.md" } ])
    );

    let (status, body) = app.get("/query?q=tell%20me%20about%20ownership").await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(body["answer"], "Ownership is covered in [id=1].");
    let contexts = body["contexts"].as_array().unwrap();
    assert_eq!(contexts.len(), 2);
    assert_eq!(contexts[0]["id"], 1);
    assert_eq!(contexts[0]["title"], "rust.txt");
    assert_eq!(contexts[0]["similarity"].as_f64().unwrap(), 0.9939);
    assert_eq!(contexts[1]["id"], 2);

    let (_, health) = app.get("/health").await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["documents"], 2);
}

#[tokio::test]
async fn query_on_empty_store_does_not_call_generation() {
    let app = start_app(LimitsConfig::default()).await;
    app.embeds("is anything here?", &[1.0, 0.0], 1).await;
    app.answers("unused", 0).await;

    let (status, body) = app.get("/query?q=is%20anything%20here%3F").await;
    assert_eq!(status, 200, "{}", body);
    assert_eq!(
        body["answer"],
        "The document database is empty. Please upload some documents first."
    );
    assert_eq!(body["contexts"], json!([]));
}

#[tokio::test]
async fn short_or_missing_query_is_bad_request() {
    let app = start_app(LimitsConfig::default()).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&app.embedding)
        .await;

    let (status, body) = app.get("/query?q=hi").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(
        body["error"]["message"],
        "Query must be at least 3 characters long."
    );

    let (status, body) = app.get("/query").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn unsupported_and_empty_uploads_are_rejected() {
    let app = start_app(LimitsConfig::default()).await;

    let (status, body) = app.upload("image.png", vec![0x89, b'P', b'N', b'G']).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Unsupported file type: .png"));

    let (status, body) = app.upload("blank.txt", b"  \n\t\n ".to_vec()).await;
    assert_eq!(status, 400);
    assert_eq!(
        body["error"]["message"],
        "No text could be extracted from the document."
    );

    let (_, docs) = app.get("/documents").await;
    assert_eq!(docs, json!([]));
}

#[tokio::test]
async fn missing_file_field_is_bad_request() {
    let app = start_app(LimitsConfig::default()).await;
    let form = reqwest::multipart::Form::new().text("note", "no file here");
    let resp = app
        .client
        .post(format!("{}/upload", app.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let limits = LimitsConfig {
        max_doc_size: 16,
        ..LimitsConfig::default()
    };
    let app = start_app(limits).await;

    let (status, body) = app.upload("big.txt", vec![b'a'; 100]).await;
    assert_eq!(status, 413);
    assert_eq!(body["error"]["code"], "payload_too_large");
    assert_eq!(
        body["error"]["message"],
        "File size exceeds the limit of 16 bytes."
    );
}

#[tokio::test]
async fn full_store_rejects_upload() {
    let limits = LimitsConfig {
        max_docs: 1,
        ..LimitsConfig::default()
    };
    let app = start_app(limits).await;
    app.embeds("first", &[1.0, 0.0], 1).await;

    let (status, _) = app.upload("first.txt", b"first".to_vec()).await;
    assert_eq!(status, 200);

    let (status, body) = app.upload("second.txt", b"second".to_vec()).await;
    assert_eq!(status, 400);
    assert_eq!(
        body["error"]["message"],
        "Database is full. Maximum of 1 documents allowed."
    );
}

#[tokio::test]
async fn embedding_outage_is_bad_gateway() {
    let app = start_app(LimitsConfig::default()).await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(503).set_body_string("service unavailable"))
        .mount(&app.embedding)
        .await;

    let (status, body) = app.upload("doc.txt", b"some content".to_vec()).await;
    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "upstream_error");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("service unavailable"));

    let (_, docs) = app.get("/documents").await;
    assert_eq!(docs, json!([]));
}

#[tokio::test]
async fn extract_text_returns_text_without_storing() {
    let app = start_app(LimitsConfig::default()).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&app.embedding)
        .await;

    let part = reqwest::multipart::Part::bytes(b"# Notes\n\nplain markdown".to_vec())
        .file_name("notes.md");
    let form = reqwest::multipart::Form::new().part("file", part);
    let resp = app
        .client
        .post(format!("{}/extract-text", app.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["filename"], "notes.md");
    assert_eq!(body["text"], "# Notes\n\nplain markdown");

    let (_, health) = app.get("/health").await;
    assert_eq!(health["documents"], 0);
}
