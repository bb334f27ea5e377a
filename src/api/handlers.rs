//! API Handlers
//!
//! HTTP request handlers for each inspection endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::{CacheService, CleanupReport};
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, GetResponse, HealthResponse, NetworkRequest, NetworkResponse,
    SetRequest, SetResponse, StatsResponse,
};
use crate::network::ConnectivityMonitor;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The cache context served by this process
    pub cache: Arc<CacheService>,
    /// Connectivity source the cache listens to
    pub network: Arc<ConnectivityMonitor>,
}

impl AppState {
    pub fn new(cache: Arc<CacheService>, network: Arc<ConnectivityMonitor>) -> Self {
        Self { cache, network }
    }
}

/// Handler for PUT /set
///
/// Stores a JSON value in the cache with optional TTL and priority.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state.cache.set(&req.key, &req.value, req.options()).await;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
///
/// Retrieves a value from the cache by key.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let value = state
        .cache
        .get::<Value>(&key)
        .await
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
///
/// Deletes a key from both tiers. Deleting an absent key succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DeleteResponse> {
    state.cache.delete(&key).await;
    Json(DeleteResponse::new(key))
}

/// Handler for POST /clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    state.cache.clear().await;
    Json(ClearResponse::new())
}

/// Handler for POST /cleanup
///
/// Runs one cleanup pass immediately.
pub async fn cleanup_handler(State(state): State<AppState>) -> Json<CleanupReport> {
    Json(state.cache.cleanup().await)
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.cache.stats().await.into())
}

/// Handler for PUT /network
///
/// Overrides the observed connectivity.
pub async fn network_handler(
    State(state): State<AppState>,
    Json(req): Json<NetworkRequest>,
) -> Json<NetworkResponse> {
    state.network.set_online(req.online);
    Json(NetworkResponse { online: req.online })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheEvent;
    use crate::config::CacheConfig;
    use serde_json::json;

    fn test_state() -> AppState {
        let network = Arc::new(ConnectivityMonitor::default());
        let cache = CacheService::builder(CacheConfig::default())
            .network(network.clone())
            .build();
        AppState::new(Arc::new(cache), network)
    }

    fn set_request(key: &str, value: Value) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value,
            ttl: None,
            priority: false,
        }
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = test_state();

        let req = set_request("user:42", json!({"name": "Aylin"}));
        assert!(set_handler(State(state.clone()), Json(req)).await.is_ok());

        let response = get_handler(State(state), Path("user:42".to_string()))
            .await
            .unwrap();
        assert_eq!(response.value, json!({"name": "Aylin"}));
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let state = test_state();

        let result = get_handler(State(state), Path("nonexistent".to_string())).await;
        assert!(matches!(result, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = test_state();
        set_handler(State(state.clone()), Json(set_request("to_delete", json!(1))))
            .await
            .unwrap();

        delete_handler(State(state.clone()), Path("to_delete".to_string())).await;

        let result = get_handler(State(state), Path("to_delete".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clear_and_stats_handlers() {
        let state = test_state();
        set_handler(State(state.clone()), Json(set_request("a", json!(1))))
            .await
            .unwrap();

        clear_handler(State(state.clone())).await;

        let response = stats_handler(State(state)).await;
        assert_eq!(response.stats.memory_size, 0);
        assert_eq!(response.stats.max_size, 100);
    }

    #[tokio::test]
    async fn test_network_handler_emits_reload() {
        let state = test_state();
        let mut events = state.cache.subscribe_events();

        network_handler(State(state.clone()), Json(NetworkRequest { online: false })).await;
        assert_eq!(events.recv().await.unwrap(), CacheEvent::Offline);

        network_handler(State(state.clone()), Json(NetworkRequest { online: true })).await;
        assert_eq!(events.recv().await.unwrap(), CacheEvent::Online);
        assert_eq!(
            events.recv().await.unwrap(),
            CacheEvent::ReloadCritical {
                keys: vec!["translations".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_set_invalid_request() {
        let state = test_state();

        let result = set_handler(State(state), Json(set_request("", json!(1)))).await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }
}
