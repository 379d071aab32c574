use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Request, StatusCode, header},
};
use coursemart_config::{ConfigLoader, models::sources::EnvConfig};
use coursemart_core::domain::users::auth::{
    AuthCrypto, CredentialStore, SessionManager, TokenService, TokenSettings,
};
use coursemart_core::infrastructure::InMemoryCredentialStore;
use coursemart_server::{AppState, create_app};
use serde_json::Value;
use tower::ServiceExt;

// Code is used by test modules, but not in every scope
#[allow(unused)]
#[derive(Debug)]
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

#[allow(unused)]
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

#[allow(unused)]
impl TestResponse {
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    pub fn set_cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{name}=");
        self.set_cookies()
            .into_iter()
            .find(|cookie| cookie.starts_with(&prefix))
    }

    /// Value of a cookie set by this response.
    pub fn cookie_value(&self, name: &str) -> Option<String> {
        self.set_cookie(name).and_then(|cookie| {
            cookie
                .split(';')
                .next()
                .and_then(|pair| pair.split_once('='))
                .map(|(_, value)| value.to_string())
        })
    }

    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }
}

pub fn build_test_app(environment: &str) -> Result<TestApp> {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("APP_ENV", environment),
        ("ACCESS_TOKEN_SECRET", "server-test-access-secret-0123456789ab"),
        ("REFRESH_TOKEN_SECRET", "server-test-refresh-secret-0123456789a"),
        ("AUTH_PASSWORD_PEPPER", "server-test-pepper-0123456789abcdefgh"),
        ("AUTH_TOKEN_HMAC_KEY", "server-test-token-hmac-key-0123456789"),
    ]);
    let load = ConfigLoader::new().load_from_env(EnvConfig::from_lookup(|key| {
        vars.get(key).map(|value| value.to_string())
    }))?;
    let config = Arc::new(load.config);

    let store: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
    let tokens = TokenService::new(TokenSettings::new(
        &config.auth.access_token_secret,
        &config.auth.refresh_token_secret,
    ))?;
    let crypto = AuthCrypto::for_tests(&config.auth.password_pepper, &config.auth.token_hmac_key)?;
    let sessions = SessionManager::new(store, Arc::new(tokens), Arc::new(crypto))
        .with_max_refresh_tokens(config.auth.max_refresh_tokens);

    let state = AppState::new(Arc::new(sessions), config);
    Ok(TestApp {
        router: create_app(state.clone()),
        state,
    })
}

#[allow(unused)]
impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Result<TestResponse> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(TestResponse {
            status,
            headers,
            body,
        })
    }

    pub async fn post_json(&self, path: &str, body: Value) -> Result<TestResponse> {
        self.send(
            Request::post(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
        )
        .await
    }

    pub async fn register(&self, email: &str, username: &str, password: &str) -> Result<TestResponse> {
        self.post_json(
            "/api/v1/users/register",
            serde_json::json!({ "email": email, "username": username, "password": password }),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TestResponse> {
        self.post_json(
            "/api/v1/users/login",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }
}
