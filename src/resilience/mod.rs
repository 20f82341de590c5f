//! 弹性：熔断器与优雅降级

pub mod circuit_breaker;
pub mod fallback;

pub use circuit_breaker::{BreakerConfig, CircuitBreaker, CircuitBreakers, CircuitState};
pub use fallback::{Degraded, FallbackCache, FallbackSource};
