use std::sync::Arc;

use ncb_core::{
    config::Config,
    engine::{CheckEngine, EngineConfig},
    session::SessionStore,
    usage::UsageLedger,
};

#[tokio::main]
async fn main() -> Result<(), ncb_core::Error> {
    ncb_core::logging::init("ncb")?;

    let cfg = Arc::new(Config::load()?);

    let registry = ncb_registry::build(&cfg).await?;
    let sessions = Arc::new(SessionStore::new(cfg.session_ttl));
    let engine = Arc::new(CheckEngine::new(
        registry,
        sessions,
        EngineConfig::from(cfg.as_ref()),
    ));

    let usage = Arc::new(match &cfg.usage_file {
        Some(path) => UsageLedger::open(path.clone())?,
        None => UsageLedger::in_memory(),
    });

    ncb_telegram::router::run_polling(cfg, engine, usage)
        .await
        .map_err(|e| ncb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
