use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::error::not_found;
use crate::middleware::{rate_limit, security_headers};
use crate::state::AppState;
use crate::{auth, todos};

/// JSON bodies above this are rejected with 413.
pub const BODY_LIMIT_BYTES: usize = 10 * 1024;

pub fn build_app(state: AppState) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config)?;

    let api = Router::new()
        .nest("/auth", auth::router())
        .nest("/todos", todos::router())
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    let router = Router::new()
        .nest("/api", api)
        .route("/health", get(|| async { "ok" }))
        .fallback(not_found)
        .with_state(state);

    Ok(security_headers::apply(router).layer(cors).layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
            })
            .on_response(
                |res: &axum::http::Response<_>,
                 _latency: std::time::Duration,
                 span: &tracing::Span| {
                    let status = res.status();
                    span.record("status", tracing::field::display(status));
                    if status.is_server_error() {
                        tracing::error!(%status, "response");
                    } else {
                        tracing::info!(%status, "response");
                    }
                },
            ),
    ))
}

fn cors_layer(config: &AppConfig) -> anyhow::Result<CorsLayer> {
    let origin = HeaderValue::from_str(config.frontend_url.trim_end_matches('/'))
        .with_context(|| format!("invalid FRONTEND_URL {:?}", config.frontend_url))?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list([origin]))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("parse listen address")?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::json;

    use super::BODY_LIMIT_BYTES;
    use crate::testing::{call, json_body, send, TestApp};

    #[tokio::test]
    async fn health_is_ok() {
        let app = TestApp::new();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let res = call(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let app = TestApp::new();
        let (status, body) = send(&app, Method::GET, "/api/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Not found");
    }

    #[tokio::test]
    async fn responses_carry_security_headers() {
        let app = TestApp::new();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let res = call(&app, req).await;
        let h = res.headers();
        assert_eq!(h[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(h[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        assert_eq!(h[header::REFERRER_POLICY], "no-referrer");
        assert!(h.contains_key(header::STRICT_TRANSPORT_SECURITY));
        assert!(h.contains_key(header::CONTENT_SECURITY_POLICY));
    }

    #[tokio::test]
    async fn cors_allows_only_frontend_with_credentials() {
        let app = TestApp::new();
        let preflight = |origin: &'static str| {
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/todos/x")
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap()
        };

        let res = call(&app, preflight("http://localhost:5173")).await;
        let h = res.headers();
        assert_eq!(h[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:5173");
        assert_eq!(h[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

        let res = call(&app, preflight("https://evil.example")).await;
        assert!(!res
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let app = TestApp::new();
        let user = app.user();
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/todos/{user}"),
            Some(user),
            Some(json!({
                "title": "big",
                "dueDate": "2099-01-01",
                "description": "x".repeat(BODY_LIMIT_BYTES + 1),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let app = TestApp::new();
        let user = app.user();
        let req = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/todos/{user}"))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", app.access_token(user)))
            .body(Body::from("{not json"))
            .unwrap();
        let res = call(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(res).await["message"].as_str().is_some());
    }

    #[tokio::test]
    async fn api_is_rate_limited_per_client() {
        let app = TestApp::with_config(|c| c.rate_limit.max_requests = 2);
        for _ in 0..2 {
            let (status, _) = send(&app, Method::GET, "/api/auth/me", None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
        let req = Request::builder()
            .uri("/api/auth/me")
            .body(Body::empty())
            .unwrap();
        let res = call(&app, req).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(res.headers().contains_key(header::RETRY_AFTER));
        assert_eq!(res.headers()["ratelimit-remaining"], "0");

        // health sits outside /api
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        assert_eq!(call(&app, req).await.status(), StatusCode::OK);
    }
}
