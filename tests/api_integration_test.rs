//! Integration tests for the HTTP API

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use expert_search::api::{ApiServer, ApiServerConfig};
use expert_search::docs::{DocumentSource, GenerationStore, JsonFileSource, ProfileRecord};
use expert_search::search::HashingEmbedder;
use expert_search::{EngineConfig, SearchEngine};

const SECRET: &str = "test_secret_key_12345";

struct TestServer {
    addr: SocketAddr,
    _data_dir: TempDir,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

fn write_profiles(dir: &TempDir) -> Result<std::path::PathBuf> {
    let records = vec![
        ProfileRecord {
            name: Some("Maria Lopez".into()),
            description: Some("Concrete bridge deck repair".into()),
            specialties: vec!["Concrete".into(), "Bridge Repair".into()],
            ..ProfileRecord::new("e1")
        },
        ProfileRecord {
            name: Some("Alex Chen".into()),
            description: Some("Timber framing".into()),
            specialties: vec!["Timber".into()],
            ..ProfileRecord::new("e2")
        },
    ];
    let path = dir.path().join("profiles.json");
    std::fs::write(&path, serde_json::to_string(&records)?)?;
    Ok(path)
}

/// Start a server on an ephemeral port, optionally with a document source
async fn start_test_server(with_source: bool, operator_password: Option<&str>) -> Result<TestServer> {
    let data_dir = TempDir::new()?;
    let engine = Arc::new(SearchEngine::open(
        Arc::new(HashingEmbedder::default()),
        EngineConfig::default().with_embedding_model("hashing"),
        GenerationStore::new(data_dir.path().join("data")),
    )?);

    let config = ApiServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        jwt_secret: SECRET.to_string(),
        operator_password: operator_password.map(str::to_string),
        allowed_origins: vec!["http://localhost:3000".to_string()],
    };
    let mut server = ApiServer::new(config, engine);
    if with_source {
        let source: Arc<dyn DocumentSource> = Arc::new(JsonFileSource::new(write_profiles(&data_dir)?));
        server = server.with_source(source);
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = server.router();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(TestServer {
        addr,
        _data_dir: data_dir,
    })
}

async fn login(client: &Client, server: &TestServer, password: &str) -> Result<reqwest::Response> {
    Ok(client
        .post(server.url("/login"))
        .json(&json!({ "username": "operator", "password": password }))
        .send()
        .await?)
}

async fn token(client: &Client, server: &TestServer) -> Result<String> {
    let body: Value = login(client, server, "secret").await?.json().await?;
    Ok(body["token"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn test_health_before_build() -> Result<()> {
    let server = start_test_server(false, None).await?;
    let client = Client::new();

    let response = client.get(server.url("/health")).send().await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["indexLoaded"], false);
    assert_eq!(body["documents"], 0);
    assert!(body["generation"].is_null());
    Ok(())
}

#[tokio::test]
async fn test_search_before_build_reports_not_built() -> Result<()> {
    let server = start_test_server(false, None).await?;
    let client = Client::new();

    let response = client
        .post(server.url("/search"))
        .json(&json!({ "query": "concrete" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await?;
    assert_eq!(body["status"], "not_built");
    assert_eq!(body["results"], json!([]));
    Ok(())
}

#[tokio::test]
async fn test_blank_query_rejected() -> Result<()> {
    let server = start_test_server(false, None).await?;
    let client = Client::new();

    let response = client
        .post(server.url("/search"))
        .json(&json!({ "query": "   " }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_build_requires_token() -> Result<()> {
    let server = start_test_server(true, None).await?;
    let client = Client::new();

    let response = client.post(server.url("/index/build")).send().await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .post(server.url("/index/build"))
        .bearer_auth("invalid.token.here")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_login_checks_operator_password() -> Result<()> {
    let server = start_test_server(true, Some("secret")).await?;
    let client = Client::new();

    assert_eq!(
        login(&client, &server, "wrong").await?.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(login(&client, &server, "").await?.status(), StatusCode::BAD_REQUEST);

    let response = login(&client, &server, "secret").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert!(body["token"].is_string());
    assert_eq!(body["expires_in_hours"], 24);
    Ok(())
}

#[tokio::test]
async fn test_login_disabled_without_operator_password() -> Result<()> {
    let server = start_test_server(true, None).await?;
    let client = Client::new();

    assert_eq!(
        login(&client, &server, "anything").await?.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
    let response = client.post(server.url("/index/build")).send().await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_build_then_search() -> Result<()> {
    let server = start_test_server(true, Some("secret")).await?;
    let client = Client::new();
    let token = token(&client, &server).await?;

    let response = client
        .post(server.url("/index/build"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "built");
    assert_eq!(body["count"], 2);
    assert_eq!(body["skipped"], 0);

    let health: Value = client.get(server.url("/health")).send().await?.json().await?;
    assert_eq!(health["indexLoaded"], true);
    assert_eq!(health["documents"], 2);
    assert_eq!(health["lexicalAvailable"], true);

    let response = client
        .post(server.url("/search"))
        .json(&json!({ "query": "concrete bridge", "limit": 5 }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["results"][0]["id"], "e1");
    assert_eq!(body["results"][0]["finalScore"], 100.0);
    assert_eq!(body["results"][0]["allKeywordsMatched"], true);
    assert!(body["results"][0]["topTerms"].is_array());

    let response = client
        .post(server.url("/search"))
        .json(&json!({ "query": "concrete", "candidateIds": ["e2"] }))
        .send()
        .await?;
    let body: Value = response.json().await?;
    assert_eq!(body["results"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["results"][0]["id"], "e2");

    let response = client
        .post(server.url("/search"))
        .json(&json!({ "query": "concrete", "candidateIds": [] }))
        .send()
        .await?;
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["results"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn test_build_without_source() -> Result<()> {
    let server = start_test_server(false, Some("secret")).await?;
    let client = Client::new();
    let token = token(&client, &server).await?;

    let response = client
        .post(server.url("/index/build"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn test_cors_preflight_honours_allowed_origins() -> Result<()> {
    let server = start_test_server(false, None).await?;
    let client = Client::new();

    let preflight = |origin: &'static str| {
        client
            .request(reqwest::Method::OPTIONS, server.url("/search"))
            .header("Origin", origin)
            .header("Access-Control-Request-Method", "POST")
            .send()
    };

    let allowed = preflight("http://localhost:3000").await?;
    assert!(allowed.status().is_success());
    assert_eq!(
        allowed
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:3000")
    );

    let denied = preflight("https://elsewhere.example").await?;
    assert!(denied.headers().get("access-control-allow-origin").is_none());
    Ok(())
}

#[tokio::test]
async fn test_embed_endpoint() -> Result<()> {
    let server = start_test_server(false, None).await?;
    let client = Client::new();

    let response = client
        .post(server.url("/embed"))
        .json(&json!({ "text": "structural engineer" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["vector"].as_array().map(Vec::len), Some(256));

    let response = client
        .post(server.url("/embed"))
        .json(&json!({ "text": "" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
