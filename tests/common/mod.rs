// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;

use quiz_backend::{
    config::Config,
    routes,
    state::AppState,
    store::MemoryStore,
    utils::jwt::{ROLE_EVALUATOR, ROLE_PARTICIPANT, sign_jwt},
};
use serde_json::{Value, json};

pub const SECRET: &str = "test_secret_for_integration_tests";

pub const EVALUATOR_ID: i64 = 1;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
///
/// Uses the in-memory store, so every call gets a fresh, empty service.
pub async fn spawn_app() -> String {
    let config = Config {
        database_url: None,
        jwt_secret: SECRET.to_string(),
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        default_time_limit_secs: 900,
        log_dir: "logs".to_string(),
    };

    let state = AppState {
        store: Arc::new(MemoryStore::new()),
        config,
    };

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

pub fn participant_token(id: i64) -> String {
    sign_jwt(id, ROLE_PARTICIPANT, SECRET, 600).unwrap()
}

pub fn evaluator_token() -> String {
    sign_jwt(EVALUATOR_ID, ROLE_EVALUATOR, SECRET, 600).unwrap()
}

/// Creates a quiz with one category per `(name, correct answers)` pair and
/// returns the stored definition.
pub async fn create_quiz(
    client: &reqwest::Client,
    address: &str,
    layout: &[(&str, &[&str])],
    time_limit_secs: u32,
) -> Value {
    let categories: Vec<Value> = layout
        .iter()
        .map(|(name, correct)| {
            json!({
                "name": name,
                "questions": correct
                    .iter()
                    .enumerate()
                    .map(|(i, answer)| json!({
                        "prompt": format!("{} question {}", name, i + 1),
                        "correct_answer": answer,
                    }))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    let response = client
        .post(format!("{}/api/quizzes", address))
        .bearer_auth(evaluator_token())
        .json(&json!({
            "title": "Workplace ethics",
            "time_limit_secs": time_limit_secs,
            "categories": categories,
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 201);
    response.json().await.unwrap()
}

/// Question ids of a quiz definition in presentation order.
pub fn question_ids(quiz: &Value) -> Vec<i64> {
    quiz["categories"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|c| c["questions"].as_array().unwrap().iter())
        .map(|q| q["id"].as_i64().unwrap())
        .collect()
}
