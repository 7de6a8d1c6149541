//! Integration tests for the generation pipeline.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use reddit_autoposter::config::Config;
use reddit_autoposter::db::{get_generated_post, Database};
use reddit_autoposter::generation::{
    GeminiClient, GenerateRequest, Generation, GenerationError, GenerationService, GeneratorError,
    TextGenerator,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

async fn count_usage_logs(db: &Database) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM usage_logs")
        .fetch_one(db.pool())
        .await
        .expect("Failed to count usage logs");
    count
}

/// Generator that replays scripted results and records which models were called.
struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<Generation, GeneratorError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn new(script: Vec<Result<Generation, GeneratorError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, model: &str, _prompt: &str) -> Result<Generation, GeneratorError> {
        self.calls.lock().unwrap().push(model.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GeneratorError::Empty))
    }
}

fn text(text: &str) -> Result<Generation, GeneratorError> {
    Ok(Generation {
        text: text.to_string(),
        total_tokens: Some(120),
    })
}

fn failure(status: u16) -> Result<Generation, GeneratorError> {
    Err(GeneratorError::Status {
        status,
        body: "unavailable".to_string(),
    })
}

fn models(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

fn request(topic: &str) -> GenerateRequest {
    GenerateRequest {
        topic: topic.to_string(),
        ..GenerateRequest::default()
    }
}

#[tokio::test]
async fn test_stub_model_output_is_split_and_scored() {
    let (db, _temp) = setup_db().await;
    let generator = ScriptedGenerator::new(vec![text("Great Title\nGreat body text here?")]);
    let service = GenerationService::new(generator.clone(), models(&["m1"]), db.clone())
        .with_rng(StdRng::seed_from_u64(11));

    let post = service.generate(&request("AI tools")).await.unwrap();

    assert_eq!(post.title, "Great Title");
    assert_eq!(post.content, "Great body text here?");
    assert_eq!(post.model, "m1");
    assert_eq!(post.token_usage, 120);
    assert_eq!(post.cost_estimate, "$0.02");
    assert_eq!(post.tags, vec!["ai-generated", "ai-tools"]);
    // Only the question-mark bonus applies, plus jitter below 3
    assert!((1.0..4.0).contains(&post.virality_score));
    assert_eq!(post.engagement, "Medium");
    assert_eq!(post.estimated_views, "2k-10k");

    let stored = get_generated_post(db.pool(), &post.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Great Title");
    assert_eq!(stored.body, "Great body text here?");
    assert!(!stored.posted_flag);
    assert_eq!(count_usage_logs(&db).await, 1);
}

#[tokio::test]
async fn test_falls_back_until_a_model_succeeds() {
    let (db, _temp) = setup_db().await;
    let generator = ScriptedGenerator::new(vec![
        failure(503),
        failure(429),
        text("Third Time\nLucky body"),
    ]);
    let service =
        GenerationService::new(generator.clone(), models(&["a", "b", "c", "d"]), db);

    let post = service.generate(&request("anything")).await.unwrap();

    assert_eq!(post.model, "c");
    assert_eq!(generator.calls(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_all_candidates_failing_is_an_error() {
    let (db, _temp) = setup_db().await;
    let generator = ScriptedGenerator::new(vec![failure(500), failure(500), failure(404)]);
    let service = GenerationService::new(generator.clone(), models(&["a", "b", "c"]), db.clone());

    let err = service.generate(&request("anything")).await.unwrap_err();

    match err {
        GenerationError::Exhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(last, GeneratorError::Status { status: 404, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(generator.calls().len(), 3);
    assert_eq!(count_usage_logs(&db).await, 0);
}

#[tokio::test]
async fn test_title_without_body_tries_next_model() {
    let (db, _temp) = setup_db().await;
    let generator = ScriptedGenerator::new(vec![text("Only a title"), text("Title\nAnd a body")]);
    let service = GenerationService::new(generator.clone(), models(&["a", "b"]), db);

    let post = service.generate(&request("anything")).await.unwrap();

    assert_eq!(post.model, "b");
    assert_eq!(post.content, "And a body");
}

#[tokio::test]
async fn test_explicit_model_is_the_only_candidate() {
    let (db, _temp) = setup_db().await;
    let generator = ScriptedGenerator::new(vec![failure(500)]);
    let service = GenerationService::new(generator.clone(), models(&["a", "b"]), db);

    let req = GenerateRequest {
        model: Some("pinned".to_string()),
        ..request("anything")
    };
    let err = service.generate(&req).await.unwrap_err();

    assert!(matches!(err, GenerationError::Exhausted { attempts: 1, .. }));
    assert_eq!(generator.calls(), vec!["pinned"]);
}

#[tokio::test]
async fn test_missing_api_key_stops_immediately() {
    let (db, _temp) = setup_db().await;
    let generator = ScriptedGenerator::new(vec![Err(GeneratorError::NotConfigured("GEMINI_API_KEY"))]);
    let service = GenerationService::new(generator.clone(), models(&["a", "b"]), db);

    let err = service.generate(&request("anything")).await.unwrap_err();

    assert!(matches!(err, GenerationError::NotConfigured("GEMINI_API_KEY")));
    assert_eq!(generator.calls(), vec!["a"]);
}

#[tokio::test]
async fn test_empty_topic_is_rejected_without_calls() {
    let (db, _temp) = setup_db().await;
    let generator = ScriptedGenerator::new(vec![]);
    let service = GenerationService::new(generator.clone(), models(&["a"]), db);

    let err = service.generate(&request("   ")).await.unwrap_err();

    assert!(matches!(err, GenerationError::InvalidRequest(_)));
    assert!(generator.calls().is_empty());
}

#[tokio::test]
async fn test_store_failure_does_not_fail_generation() {
    let (db, _temp) = setup_db().await;
    db.close().await;
    let generator = ScriptedGenerator::new(vec![text("Still Works\nEven without storage")]);
    let service = GenerationService::new(generator, models(&["a"]), db);

    let post = service.generate(&request("anything")).await.unwrap();

    assert_eq!(post.title, "Still Works");
    assert!(!post.id.is_empty());
}

// ========== Gemini client ==========

fn gemini_config(server: &MockServer) -> Config {
    Config {
        gemini_base_url: server.uri(),
        ..Config::for_testing()
    }
}

#[tokio::test]
async fn test_gemini_client_parses_candidates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_string_contains("write about cats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "Cats Rule\n"}, {"text": "They really do."}]}
            }],
            "usageMetadata": {"totalTokenCount": 42}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GeminiClient::new(&gemini_config(&server)).unwrap();
    let generation = client
        .generate("gemini-2.0-flash", "write about cats")
        .await
        .unwrap();

    assert_eq!(generation.text, "Cats Rule\nThey really do.");
    assert_eq!(generation.total_tokens, Some(42));
}

#[tokio::test]
async fn test_gemini_client_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let client = GeminiClient::new(&gemini_config(&server)).unwrap();
    let err = client.generate("gemini-pro", "prompt").await.unwrap_err();

    assert!(matches!(err, GeneratorError::Status { status: 503, ref body } if body == "overloaded"));
}

#[tokio::test]
async fn test_gemini_client_empty_candidates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let client = GeminiClient::new(&gemini_config(&server)).unwrap();
    let err = client.generate("gemini-pro", "prompt").await.unwrap_err();

    assert!(matches!(err, GeneratorError::Empty));
}

#[tokio::test]
async fn test_gemini_client_without_key_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = Config {
        gemini_api_key: None,
        ..gemini_config(&server)
    };
    let client = GeminiClient::new(&config).unwrap();
    let err = client.generate("gemini-pro", "prompt").await.unwrap_err();

    assert!(matches!(err, GeneratorError::NotConfigured(_)));
}

#[tokio::test]
async fn test_service_falls_back_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/first:generateContent"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/second:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "# Fallback Title\nFallback body!"}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (db, _temp) = setup_db().await;
    let client = Arc::new(GeminiClient::new(&gemini_config(&server)).unwrap());
    let service = GenerationService::new(client, models(&["first", "second"]), db);

    let post = service.generate(&request("trending gadgets")).await.unwrap();

    assert_eq!(post.model, "second");
    assert_eq!(post.title, "Fallback Title");
    assert_eq!(post.content, "Fallback body!");
    // Body length is estimated when the provider reports no usage
    assert_eq!(post.token_usage, ("# Fallback Title\nFallback body!".len() / 4) as u64);
}
