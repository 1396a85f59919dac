//! Shared application state for the game server.

use std::sync::Arc;

use undercover_core::error::Result;

use crate::config::GatewayConfig;
use crate::obs::GameMetrics;
use crate::rooms::RoomRegistry;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    registry: RoomRegistry,
    metrics: Arc<GameMetrics>,
}

impl AppState {
    /// Build application state.
    /// Returns Result so main can handle errors gracefully (no panic).
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        cfg.validate()?;

        let metrics = Arc::new(GameMetrics::default());
        let registry = RoomRegistry::new(cfg.rooms.clone(), cfg.game, Arc::clone(&metrics));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry,
                metrics,
            }),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.inner.registry
    }

    pub fn metrics(&self) -> Arc<GameMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn is_draining(&self) -> bool {
        self.inner.metrics.is_draining()
    }

    /// Stop accepting work and shut every room down.
    pub async fn drain(&self) {
        self.inner.metrics.set_draining();
        self.inner.registry.close().await;
    }
}
