//! Router-level test harness backed by the in-memory stores.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::FromRef,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crate::app::build_app;
use crate::auth::{
    memory::MemoryUserStore,
    services::{JwtKeys, TokenKind},
};
use crate::config::AppConfig;
use crate::state::AppState;
use crate::todos::memory::MemoryTodoStore;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub todos: Arc<MemoryTodoStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = AppState::fake_config();
        tweak(&mut config);
        let todos = Arc::new(MemoryTodoStore::default());
        let state = AppState::from_parts(
            Arc::new(config),
            todos.clone(),
            Arc::new(MemoryUserStore::default()),
        );
        let router = build_app(state.clone()).expect("app builds");
        Self {
            router,
            state,
            todos,
        }
    }

    /// A fresh user id; todo routes only need a valid session for it.
    pub fn user(&self) -> Uuid {
        Uuid::new_v4()
    }

    pub fn access_token(&self, user: Uuid) -> String {
        JwtKeys::from_ref(&self.state)
            .sign(user, TokenKind::Access)
            .expect("sign access token")
    }
}

pub async fn call(app: &TestApp, req: Request<Body>) -> Response {
    app.router.clone().oneshot(req).await.expect("infallible")
}

pub async fn json_body(res: Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .expect("read body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Sends a JSON request, authenticated as `as_user` via bearer token when given.
pub async fn send(
    app: &TestApp,
    method: Method,
    path: &str,
    as_user: Option<Uuid>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(path);
    if let Some(user) = as_user {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", app.access_token(user)));
    }
    let req = match body {
        Some(v) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string())),
        None => req.body(Body::empty()),
    }
    .expect("valid request");
    let res = call(app, req).await;
    let status = res.status();
    (status, json_body(res).await)
}
