//! Home Assistant REST client

use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;

use hamgate_core::config::BackendConfig;

use super::entities::Entity;
use super::BackendError;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Default)]
struct StateCache {
    entities: Vec<Entity>,
    fetched_at: Option<Instant>,
}

/// Client for the Home Assistant REST API with a short-lived state cache
#[derive(Debug)]
pub struct HomeAssistantClient {
    http: Client,
    base_url: String,
    token: String,
    cache_ttl: Duration,
    cache: Mutex<StateCache>,
}

impl HomeAssistantClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.trim().trim_end_matches('/').to_string(),
            token: config.token.clone(),
            cache_ttl: config.cache_ttl,
            cache: Mutex::new(StateCache::default()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Response, BackendError> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!("{} {}", method, url);

        let mut request = self.http.request(method, &url).bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => Err(BackendError::Unauthorized),
            StatusCode::NOT_FOUND => Err(BackendError::NotFound(endpoint.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::error!("Backend returned {} for {}: {}", status, endpoint, body);
                Err(BackendError::Api {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    /// All entity states, served from cache while it is fresh
    pub async fn get_states(&self, use_cache: bool) -> Result<Vec<Entity>, BackendError> {
        let mut cache = self.cache.lock().await;

        if use_cache {
            if let Some(fetched_at) = cache.fetched_at {
                if fetched_at.elapsed() < self.cache_ttl {
                    tracing::debug!("Using {} cached entities", cache.entities.len());
                    return Ok(cache.entities.clone());
                }
            }
        }

        let response = self.request(Method::GET, "/api/states", None).await?;
        let entities: Vec<Entity> = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        tracing::debug!("Fetched {} entities", entities.len());
        cache.entities = entities.clone();
        cache.fetched_at = Some(Instant::now());
        Ok(entities)
    }

    /// Call `domain.service` with a JSON body
    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: Value,
    ) -> Result<Value, BackendError> {
        let endpoint = format!("/api/services/{}/{}", domain, service);
        let response = self.request(Method::POST, &endpoint, Some(&data)).await?;
        let body = response.text().await?;

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }

    /// Forget cached states so the next read hits the API
    pub async fn invalidate_cache(&self) {
        let mut cache = self.cache.lock().await;
        cache.fetched_at = None;
    }
}
