//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs the session key and basic result info.

use std::sync::Arc;

use axum::{
  extract::{rejection::JsonRejection, Path, State},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::logic::{generate_challenges, send_message};
use crate::protocol::*;
use crate::session::SessionKey;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_root() -> impl IntoResponse {
  Json(RootOut { status: "healthy", service: "CareerTrials AI API", version: env!("CARGO_PKG_VERSION") })
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let database = if state.store.ping().await { "connected" } else { "unavailable" };
  Json(HealthOut { status: "healthy", database, model: state.model.model_id().to_string() })
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_message(
  State(state): State<Arc<AppState>>,
  Path((session_id, user_id)): Path<(String, String)>,
  body: Result<Json<MessageIn>, JsonRejection>,
) -> Result<Json<MessageOut>, AppError> {
  let Json(body) = body.map_err(|e| AppError::Validation(e.body_text()))?;
  let message = body.validated().map_err(AppError::Validation)?;
  info!(target: "session", %session_id, %user_id, message_len = message.len(), "Received message");

  let key = SessionKey::new(session_id, user_id);
  let reply = send_message(&state, &key, &message).await?;
  Ok(Json(MessageOut {
    response: reply.text,
    session_id: key.session_id,
    user_id: key.user_id,
    is_complete: reply.is_complete,
  }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_complete(
  State(state): State<Arc<AppState>>,
  Path((session_id, user_id)): Path<(String, String)>,
) -> Result<Json<ChallengesOut>, AppError> {
  let key = SessionKey::new(session_id, user_id);
  let challenges = generate_challenges(&state, &key).await?;
  Ok(Json(ChallengesOut { total: challenges.len(), challenges, session_id: key.session_id }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path((session_id, user_id)): Path<(String, String)>,
) -> impl IntoResponse {
  state.sessions.clear(&SessionKey::new(session_id, user_id)).await;
  Json(ClearedOut { message: "Session cleared successfully" })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_status(
  State(state): State<Arc<AppState>>,
  Path((session_id, user_id)): Path<(String, String)>,
) -> impl IntoResponse {
  let key = SessionKey::new(session_id, user_id);
  let active = state.sessions.exists(&key).await;
  Json(SessionStatusOut {
    session_id: key.session_id,
    user_id: key.user_id,
    active,
    status: if active { "active" } else { "inactive" },
  })
}

#[cfg(test)]
mod tests {
  use axum::body::Body;
  use axum::http::{Request, StatusCode};
  use http_body_util::BodyExt;
  use serde_json::{json, Value};
  use tower::ServiceExt;

  use crate::agent::test_support::ScriptedModel;
  use crate::routes::build_router;
  use crate::state::AppState;

  async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
      .method("POST")
      .uri(uri)
      .header("content-type", "application/json")
      .body(Body::from(body.to_string()))
      .unwrap()
  }

  fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
  }

  fn challenge(i: usize) -> Value {
    let kind = if i % 3 == 0 { "Quiz" } else { "Code" };
    json!({
      "title": format!("Desafio {i}"),
      "description": "Crie uma API REST com autenticação",
      "type": kind,
      "difficulty": "Medium",
      "xp": 100,
      "level": 3,
      "estimatedTime": "2h",
      "tags": ["backend"],
      "questions": [{ "question": "O que é REST?", "choices": ["Um estilo", "Um banco"], "answer": "Um estilo" }]
    })
  }

  #[tokio::test]
  async fn root_and_health_report_service_and_model() {
    let app = build_router(AppState::for_tests(ScriptedModel::new(Vec::<&str>::new())));

    let resp = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "CareerTrials AI API");

    let json = body_json(app.oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(json["database"], "connected");
    assert_eq!(json["model"], "scripted-model");
  }

  #[tokio::test]
  async fn message_to_fresh_session_returns_reply() {
    let app = build_router(AppState::for_tests(ScriptedModel::new(["Legal! Qual é o seu nível de experiência?"])));
    let resp = app
      .oneshot(post_json("/session/s1/u1/message", json!({ "message": "Quero virar backend developer" })))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert!(!json["response"].as_str().unwrap().is_empty());
    assert_eq!(json["is_complete"], false);
    assert_eq!(json["session_id"], "s1");
    assert_eq!(json["user_id"], "u1");
  }

  #[tokio::test]
  async fn invalid_message_bodies_are_rejected_before_the_model() {
    let model = ScriptedModel::new(["unused"]);
    let app = build_router(AppState::for_tests(model.clone()));

    for body in [json!({ "message": "   " }), json!({ "message": "x".repeat(2001) }), json!({ "text": "hi" })] {
      let resp = app.clone().oneshot(post_json("/session/s/u/message", body)).await.unwrap();
      assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
      assert_eq!(body_json(resp).await["error"], "Invalid request");
    }
    assert_eq!(model.call_count(), 0);
  }

  #[tokio::test]
  async fn complete_with_prose_output_is_422_with_raw_output() {
    let app = build_router(AppState::for_tests(ScriptedModel::new(["Desculpe, não entendi"])));
    let resp = app.oneshot(post_json("/session/s1/u1/complete", json!({}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(resp).await;
    assert_eq!(json["error"], "Failed to parse challenges");
    assert_eq!(json["raw_output"], "Desculpe, não entendi");
  }

  #[tokio::test]
  async fn complete_with_twelve_valid_challenges_returns_all() {
    let batch = Value::Array((0..12).map(challenge).collect()).to_string();
    let app = build_router(AppState::for_tests(ScriptedModel::new([batch])));
    let resp = app.oneshot(post_json("/session/s1/u1/complete", json!({}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["total"], 12);
    assert_eq!(json["challenges"].as_array().unwrap().len(), 12);
    assert_eq!(json["session_id"], "s1");
    assert_eq!(json["challenges"][0]["questions"].as_array().unwrap().len(), 1);
    assert!(json["challenges"][1]["questions"].as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn complete_with_only_invalid_challenges_is_422() {
    let app = build_router(AppState::for_tests(ScriptedModel::new([r#"[{"title": "só título"}]"#])));
    let resp = app.oneshot(post_json("/session/s1/u1/complete", json!({}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(resp).await["error"], "No valid challenges generated");
  }

  #[tokio::test]
  async fn upstream_failure_is_500_with_detail() {
    let app = build_router(AppState::for_tests(ScriptedModel::failing("connection refused")));
    let resp = app
      .oneshot(post_json("/session/s1/u1/message", json!({ "message": "oi" })))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(resp).await;
    assert_eq!(json["error"], "Internal server error");
    assert!(json["detail"].as_str().unwrap().contains("connection refused"));
  }

  #[tokio::test]
  async fn status_follows_session_lifecycle() {
    let app = build_router(AppState::for_tests(ScriptedModel::new(["Olá!"])));

    let json = body_json(app.clone().oneshot(get("/session/s1/u1/status")).await.unwrap()).await;
    assert_eq!(json["active"], false);
    assert_eq!(json["status"], "inactive");

    app.clone().oneshot(post_json("/session/s1/u1/message", json!({ "message": "oi" }))).await.unwrap();
    let json = body_json(app.clone().oneshot(get("/session/s1/u1/status")).await.unwrap()).await;
    assert_eq!(json["active"], true);
    assert_eq!(json["status"], "active");

    let del = Request::builder().method("DELETE").uri("/session/s1/u1").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(del).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["message"], "Session cleared successfully");

    let json = body_json(app.oneshot(get("/session/s1/u1/status")).await.unwrap()).await;
    assert_eq!(json["active"], false);
  }
}
