//! HTTP surface tests driven through the router

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{fixture, tool_call_message, ScriptedProvider};
use std::sync::Arc;
use taskora::providers::ChatMessage;
use taskora::server::{build_router, AppContext};
use tower::ServiceExt;

fn router_for(
    f: common::Fixture,
) -> (
    axum::Router,
    Arc<taskora::storage::ConversationStore>,
    tempfile::TempDir,
) {
    let conversations = f.conversations.clone();
    let state = Arc::new(AppContext {
        orchestrator: f.orchestrator,
        conversations: f.conversations,
        directory: f.directory,
    });
    (build_router(state), conversations, f.dir)
}

fn chat_request(token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_endpoint_is_open() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let (router, _, _dir) = router_for(fixture(provider));

    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn chat_without_token_is_401() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let (router, _, _dir) = router_for(fixture(provider));

    let response = router
        .oneshot(chat_request(None, serde_json::json!({"message": "hi"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn chat_with_unknown_token_is_401() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let (router, _, _dir) = router_for(fixture(provider));

    let response = router
        .oneshot(chat_request(
            Some("not-a-token"),
            serde_json::json!({"message": "hi"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn chat_with_empty_message_is_422() {
    let provider = Arc::new(ScriptedProvider::new(vec![]));
    let (router, _, _dir) = router_for(fixture(provider));

    let response = router
        .oneshot(chat_request(
            Some("token-alpha"),
            serde_json::json!({"message": "   "}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn chat_with_foreign_conversation_is_404() {
    let provider = Arc::new(ScriptedProvider::new(vec![ChatMessage::assistant("ok")]));
    let (router, _, _dir) = router_for(fixture(provider));

    // user-1 creates a conversation
    let response = router
        .clone()
        .oneshot(chat_request(
            Some("token-alpha"),
            serde_json::json!({"message": "hello"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let conversation_id = body["conversation_id"].as_str().unwrap().to_string();

    // user-2 cannot continue it
    let response = router
        .oneshot(chat_request(
            Some("token-beta"),
            serde_json::json!({
                "conversation_id": conversation_id,
                "message": "let me in"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"], "conversation not found");
}

#[tokio::test]
async fn chat_happy_path_returns_contracted_shape() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        tool_call_message("create_task", serde_json::json!({"title": "buy milk"})),
        ChatMessage::assistant("Added \"buy milk\" to your list."),
    ]));
    let (router, _, _dir) = router_for(fixture(provider));

    let response = router
        .oneshot(chat_request(
            Some("token-alpha"),
            serde_json::json!({"message": "Add buy milk to my list"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert!(body["conversation_id"].is_string());
    assert_eq!(body["response"], "Added \"buy milk\" to your list.");
    assert_eq!(body["tool_calls"].as_array().unwrap().len(), 1);
    assert_eq!(body["tool_calls"][0]["name"], "create_task");
    assert_eq!(body["tool_calls"][0]["arguments"]["title"], "buy milk");
    assert!(body["tool_calls"][0]["result"]["task_id"].is_string());
}

#[tokio::test]
async fn conversations_can_be_listed_and_deleted() {
    let provider = Arc::new(ScriptedProvider::new(vec![ChatMessage::assistant("ok")]));
    let (router, conversations, _dir) = router_for(fixture(provider));

    let response = router
        .clone()
        .oneshot(chat_request(
            Some("token-alpha"),
            serde_json::json!({"message": "hello"}),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    let conversation_id = body["conversation_id"].as_str().unwrap().to_string();

    // Listed for the owner
    let response = router
        .clone()
        .oneshot(
            Request::get("/conversations")
                .header(header::AUTHORIZATION, "Bearer token-alpha")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = json_body(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["conversation_id"], conversation_id.as_str());

    // Foreign delete is 404 and leaves the record
    let response = router
        .clone()
        .oneshot(
            Request::delete(format!("/conversations/{}", conversation_id))
                .header(header::AUTHORIZATION, "Bearer token-beta")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(conversations
        .get_conversation("user-1", &conversation_id)
        .unwrap()
        .is_some());

    // Owner delete succeeds
    let response = router
        .oneshot(
            Request::delete(format!("/conversations/{}", conversation_id))
                .header(header::AUTHORIZATION, "Bearer token-alpha")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(conversations
        .get_conversation("user-1", &conversation_id)
        .unwrap()
        .is_none());
}
