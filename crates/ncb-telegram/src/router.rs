use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio_util::sync::CancellationToken;

use ncb_core::{config::Config, engine::CheckEngine, messaging::port::MessagingPort, usage::UsageLedger};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub engine: Arc<CheckEngine>,
    pub messenger: Arc<dyn MessagingPort>,
    pub usage: Arc<UsageLedger>,
}

pub async fn run_polling(
    cfg: Arc<Config>,
    engine: Arc<CheckEngine>,
    usage: Arc<UsageLedger>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(bot = %me.username(), "bot started"),
        Err(e) => tracing::warn!(error = %e, "get_me failed; continuing"),
    }
    tracing::info!(
        admins = cfg.admin_ids.len(),
        page_size = engine.page_size(),
        session_ttl_secs = engine.sessions().ttl().as_secs(),
        force_join = cfg.force_join_channel.as_deref().unwrap_or("-"),
        "configuration loaded"
    );

    let cancel = CancellationToken::new();
    let sweeper = engine
        .sessions()
        .clone()
        .spawn_sweeper(cfg.session_sweep_interval, cancel.clone());

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let state = Arc::new(AppState {
        cfg,
        engine,
        messenger,
        usage,
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_inline_query().endpoint(handlers::handle_inline))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    cancel.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "session sweeper task failed");
    }
    tracing::info!("bot stopped");
    Ok(())
}
