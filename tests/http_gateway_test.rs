//! HttpGateway 集成测试：对本地 axum 假后端发真实 HTTP 请求

use axum::{
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use ayzen::api::{
    ApiError, ApiGateway, HttpGateway, KeywordSource, ScrapeConfig, TaskId, TRANSPORT_FAILURE,
};

async fn start_scrape(Json(body): Json<Value>) -> impl IntoResponse {
    // 字段名为 kebab-case
    let domains = body["target-domains"].as_u64().unwrap_or(0);
    if body["keyword-source"] == "ai" && body["ai-prompt"].is_null() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "AI prompt is required"})),
        );
    }
    if domains < 10 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid configuration"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"message": "Scraping process initiated", "task_id": 7})),
    )
}

async fn status(Path(id): Path<String>) -> impl IntoResponse {
    match id.as_str() {
        "7" => (
            StatusCode::OK,
            Json(json!({
                "task_id": 7,
                "status": "running",
                "progress": 42.5,
                "log": ["[10:00:01] Crawling example.com"],
                "result_files": []
            })),
        ),
        "500" => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))),
        other => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("Task with ID {} not found.", other)})),
        ),
    }
}

async fn cancel(Path(id): Path<String>) -> impl IntoResponse {
    if id == "7" {
        (
            StatusCode::OK,
            Json(json!({"message": "Cancellation signal sent."})),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Task already completed."})),
        )
    }
}

async fn chat(Json(body): Json<Value>) -> impl IntoResponse {
    let persona = body["persona_id"].as_str().unwrap_or_default().to_string();
    let message = body["message"].as_str().unwrap_or_default().to_string();
    if persona == "5" {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "AI Chat service is not available."})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"reply": format!("{} says: {}", persona, message)})),
    )
}

async fn results(Path(name): Path<String>) -> impl IntoResponse {
    if name == "leads.csv" {
        (StatusCode::OK, "name,email\n".to_string())
    } else {
        (StatusCode::NOT_FOUND, String::new())
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok", "timestamp": "2024-05-01T10:00:00.000000"}))
}

async fn spawn_backend() -> String {
    let app = Router::new()
        .route("/api/v1/start_scrape", post(start_scrape))
        .route("/api/v1/status/:id", get(status))
        .route("/api/v1/cancel/:id", post(cancel))
        .route("/api/v1/chat", post(chat))
        .route("/api/v1/results/:name", get(results))
        .route("/health", get(health));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_start_and_status() {
    let gw = HttpGateway::new(&spawn_backend().await);

    let started = gw.start_task(&ScrapeConfig::default()).await.unwrap();
    assert_eq!(started.task_id, TaskId::from("7"));

    let report = gw.get_status(&started.task_id).await.unwrap();
    assert_eq!(report.status, "running");
    assert_eq!(report.progress, 42.5);
    assert_eq!(report.log, vec!["[10:00:01] Crawling example.com".to_string()]);
    assert!(report.terminal().is_none());
}

#[tokio::test]
async fn test_start_rejected_uses_error_field() {
    let gw = HttpGateway::new(&spawn_backend().await);
    let config = ScrapeConfig {
        keyword_source: KeywordSource::Ai,
        ai_prompt: None,
        ..Default::default()
    };
    let err = gw.start_task(&config).await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Server {
            status: 400,
            message: "AI prompt is required".into()
        }
    );
}

#[tokio::test]
async fn test_status_not_found_is_distinct() {
    let gw = HttpGateway::new(&spawn_backend().await);
    let err = gw.get_status(&TaskId::from("99")).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Task with ID 99 not found.");

    // 无结构化字段时回退到状态文本
    let err = gw.get_status(&TaskId::from("500")).await.unwrap_err();
    assert!(!err.is_not_found());
    assert_eq!(err.to_string(), "Internal Server Error");
}

#[tokio::test]
async fn test_cancel_messages() {
    let gw = HttpGateway::new(&spawn_backend().await);
    let msg = gw.cancel_task(&TaskId::from("7")).await.unwrap();
    assert_eq!(msg, "Cancellation signal sent.");

    let err = gw.cancel_task(&TaskId::from("8")).await.unwrap_err();
    assert_eq!(err.to_string(), "Task already completed.");
}

#[tokio::test]
async fn test_chat_reply_and_failure() {
    let gw = HttpGateway::new(&spawn_backend().await);
    let reply = gw.send_chat_message("status?", "2").await.unwrap();
    assert_eq!(reply, "2 says: status?");

    let err = gw.send_chat_message("hello", "5").await.unwrap_err();
    assert_eq!(err.to_string(), "AI Chat service is not available.");
}

#[tokio::test]
async fn test_download_and_health() {
    let gw = HttpGateway::new(&spawn_backend().await);
    let bytes = gw.download_result("leads.csv").await.unwrap();
    assert_eq!(bytes, b"name,email\n".to_vec());
    assert!(gw.download_result("missing.csv").await.unwrap_err().is_not_found());

    let health = gw.health().await.unwrap();
    assert_eq!(health.status, "ok");
}

#[tokio::test]
async fn test_transport_failure_message() {
    // 绑定后立即释放端口，之后的连接会被拒绝
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gw = HttpGateway::new(&format!("http://{}", addr));
    let err = gw.get_status(&TaskId::from("1")).await.unwrap_err();
    assert_eq!(err, ApiError::transport());
    assert_eq!(err.to_string(), TRANSPORT_FAILURE);
}

#[tokio::test]
async fn test_task_id_with_reserved_characters_stays_in_path() {
    let gw = HttpGateway::new(&spawn_backend().await);
    // 未编码时 "?x" 会变成查询串，请求落到任务 7 上
    let err = gw.get_status(&TaskId::from("7?x")).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Task with ID 7?x not found.");

    let err = gw.cancel_task(&TaskId::from("7#frag")).await.unwrap_err();
    assert_eq!(err.to_string(), "Task already completed.");
}
