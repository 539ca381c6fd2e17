//! Telegram update handlers.
//!
//! Each handler is a small adapter that:
//! - records the user in the usage ledger
//! - enforces channel membership when configured
//! - turns the update into tokens or a navigation event for the engine

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, InlineQuery, Message},
};

use ncb_core::{
    domain::{ChatId, UserId},
    report::escape_html,
    security::is_admin,
};

use crate::router::AppState;

mod callback;
mod commands;
mod document;
mod inline;
mod membership;
mod submit;
mod text;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(bot, q, state).await
}

pub async fn handle_inline(bot: Bot, q: InlineQuery, state: Arc<AppState>) -> ResponseResult<()> {
    inline::handle_inline(bot, q, state).await
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let user_id = UserId(user.id.0 as i64);

    if state
        .usage
        .touch_user(user_id, user.username.as_deref())
        .await
    {
        announce_new_user(&state, user_id, user.username.as_deref()).await;
    }

    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return commands::handle_command(bot, msg, state).await;
        }
    }

    if !membership::ensure_member(&bot, &state, msg.chat.id, user.id).await {
        return Ok(());
    }

    if msg.document().is_some() {
        return document::handle_document(bot, msg, state).await;
    }

    if msg.text().is_some() {
        return text::handle_text(bot, msg, state).await;
    }

    let _ = bot
        .send_message(
            msg.chat.id,
            "Send a .txt file with one number per line, or paste the numbers as text.",
        )
        .await;
    Ok(())
}

async fn announce_new_user(state: &AppState, user_id: UserId, username: Option<&str>) {
    if is_admin(Some(user_id), &state.cfg.admin_ids) {
        return;
    }
    let who = match username {
        Some(name) if !name.is_empty() => format!("@{}", escape_html(name)),
        _ => "(no username)".to_string(),
    };
    let text = format!("👤 New user: {who}\nID: <code>{}</code>", user_id.0);
    for &admin in &state.cfg.admin_ids {
        if let Err(e) = state.messenger.send_html(ChatId(admin), &text).await {
            tracing::warn!(admin, error = %e, "failed to notify admin");
        }
    }
}
