//! Registry adapters (HTTP service, flat file).

pub mod file;
pub mod http;

use std::sync::Arc;

use ncb_core::{
    config::{Config, RegistrySource},
    registry::Registry,
    Result,
};

pub use file::FileRegistry;
pub use http::HttpRegistry;

/// Build the registry selected by `cfg.registry`.
pub async fn build(cfg: &Config) -> Result<Arc<dyn Registry>> {
    let registry: Arc<dyn Registry> = match &cfg.registry {
        RegistrySource::Http { base_url } => {
            Arc::new(HttpRegistry::new(base_url.clone(), cfg.registry_timeout)?)
        }
        RegistrySource::File { path } => Arc::new(FileRegistry::open(path.clone()).await?),
    };
    tracing::info!(registry = registry.name(), "registry ready");
    Ok(registry)
}
