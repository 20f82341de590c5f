//! 优雅降级
//!
//! 熔断器拒绝调用时：返回该资源最近一次成功结果（标记 stale），否则返回通用的「不可用」占位值。

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value;

/// 降级结果来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackSource {
    Cache,
    Default,
}

/// 降级结果
#[derive(Debug, Clone, Serialize)]
pub struct Degraded {
    pub source: FallbackSource,
    pub data: Value,
    pub stale: bool,
}

/// 每个资源最近一次成功结果
#[derive(Debug, Default)]
pub struct FallbackCache {
    entries: RwLock<HashMap<String, Value>>,
}

impl FallbackCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, resource: &str, value: Value) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(resource.to_string(), value);
    }

    pub fn get(&self, resource: &str) -> Option<Value> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(resource)
            .cloned()
    }

    /// 降级：有缓存用缓存，否则默认占位
    pub fn degrade(&self, resource: &str) -> Degraded {
        match self.get(resource) {
            Some(data) => {
                tracing::info!("Using cached response for {}", resource);
                Degraded {
                    source: FallbackSource::Cache,
                    data,
                    stale: true,
                }
            }
            None => {
                tracing::warn!("No cache available for {}, using defaults", resource);
                Degraded {
                    source: FallbackSource::Default,
                    data: serde_json::json!({ "message": "Service temporarily unavailable" }),
                    stale: true,
                }
            }
        }
    }
}
