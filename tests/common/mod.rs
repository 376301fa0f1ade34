#![allow(dead_code)]

/// Shared harness for API tests: in-memory database, temp public directory,
/// recording mailer
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use quillpad::{
    config::ServerConfig, context::AppContext, error::BlogResult, mailer::MailSender,
    server::build_router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "longenough1";

/// Captures links instead of sending mail
#[derive(Clone, Default)]
pub struct RecordingMailer {
    pub activation_links: Arc<Mutex<Vec<String>>>,
    pub reset_links: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send_activation_link(&self, _to: &[String], link: &str) -> BlogResult<()> {
        self.activation_links.lock().unwrap().push(link.to_string());
        Ok(())
    }

    async fn send_reset_password_link(&self, _to: &[String], link: &str) -> BlogResult<()> {
        self.reset_links.lock().unwrap().push(link.to_string());
        Ok(())
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// `jwt=<value>` pair from Set-Cookie, if any
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("jwt="))
            .map(|v| v.split(';').next().unwrap().to_string())
    }

    pub fn raw_set_cookie(&self) -> String {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("jwt="))
            .unwrap_or_default()
            .to_string()
    }
}

pub struct TestApp {
    pub ctx: AppContext,
    pub router: Router,
    pub mailer: RecordingMailer,
    pub dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// App whose test config is adjusted by `configure` before startup
    pub async fn with_config(configure: impl FnOnce(&mut ServerConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::for_tests(dir.path().join("public"));
        configure(&mut config);
        let mailer = RecordingMailer::default();
        let ctx = AppContext::new(config)
            .await
            .unwrap()
            .with_mailer(Arc::new(mailer.clone()));
        let router = build_router(ctx.clone());

        Self {
            ctx,
            router,
            mailer,
            dir,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).unwrap()).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Sign up `username` and return its session cookie
    pub async fn signup(&self, username: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/users/signup",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{}@x.com", username),
                    "password": PASSWORD,
                })),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "signup failed: {}", response.body);
        response.session_cookie().unwrap()
    }

    /// Id of `username` as reported by the profile endpoint
    pub async fn user_id(&self, cookie: &str, username: &str) -> i64 {
        let response = self
            .request(Method::GET, &format!("/users/{}", username), Some(cookie), None)
            .await;
        assert_eq!(response.status, StatusCode::OK);
        response.body["data"]["id"].as_i64().unwrap()
    }

    /// Create a post and return its id
    pub async fn create_post(&self, cookie: &str, title: &str) -> i64 {
        let response = self
            .request(
                Method::POST,
                "/posts/create",
                Some(cookie),
                Some(json!({ "title": title, "text": "some text" })),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "create failed: {}", response.body);
        response.body["data"]["id"].as_i64().unwrap()
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.ctx.db)
            .await
            .unwrap()
    }
}
