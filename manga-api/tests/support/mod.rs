//! Shared harness for router-level integration tests.
//!
//! Builds the full router over the in-memory catalog and KV store, and
//! offers a small request helper that decodes JSON bodies.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use manga_api::{
    create_router, password::hash_password, AppState, Repositories, ServerConfig, TokenConfig,
    TokenService,
};
use manga_core::{NewUser, Role, User};
use manga_storage::{InMemoryCatalog, InMemoryKvStore, TtlPolicy, UserRepository};
use serde_json::Value;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub catalog: Arc<InMemoryCatalog>,
    pub kv: Arc<InMemoryKvStore>,
    pub tokens: TokenService,
}

/// Decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub cache: Option<String>,
    pub body: Value,
}

impl TestResponse {
    pub fn error_code(&self) -> Option<&str> {
        self.body.get("code").and_then(Value::as_str)
    }
}

pub fn test_app() -> Result<TestApp, String> {
    let catalog = Arc::new(InMemoryCatalog::new());
    let kv = Arc::new(InMemoryKvStore::new());
    let tokens = TokenService::new(TokenConfig::default()).map_err(|e| e.to_string())?;

    let state = AppState::new(
        Repositories::from_shared(catalog.clone()),
        kv.clone(),
        TtlPolicy::new(),
        tokens.clone(),
    );
    let router = create_router(state, &ServerConfig::default());

    Ok(TestApp {
        router,
        catalog,
        kv,
        tokens,
    })
}

impl TestApp {
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<TestResponse, String> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .map_err(|e| e.to_string())?;

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        let status = response.status();
        let cache = response
            .headers()
            .get("x-cache")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| format!("Failed to read body: {:?}", e))?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        Ok(TestResponse {
            status,
            cache,
            body,
        })
    }

    pub async fn get(&self, uri: &str) -> Result<TestResponse, String> {
        self.send(Method::GET, uri, None, None).await
    }

    /// Insert a user directly and return it with a fresh access token.
    pub async fn user_with_role(&self, username: &str, role: Role) -> Result<(User, String), String> {
        let user = UserRepository::create(
            self.catalog.as_ref(),
            NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: hash_password("correct-horse").map_err(|e| e.to_string())?,
                role,
            },
        )
        .await
        .map_err(|e| e.to_string())?;
        let pair = self.tokens.issue_pair(&user).map_err(|e| e.to_string())?;
        Ok((user, pair.access_token))
    }

    pub async fn admin_token(&self) -> Result<String, String> {
        Ok(self.user_with_role("admin", Role::Admin).await?.1)
    }
}
