use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, Recipient},
};

use crate::router::AppState;

/// `@name` to a public t.me link. Numeric chat ids have no public link.
fn channel_link(channel: &str) -> Option<reqwest::Url> {
    let name = channel.strip_prefix('@')?;
    reqwest::Url::parse(&format!("https://t.me/{name}")).ok()
}

fn recipient(channel: &str) -> Recipient {
    match channel.parse::<i64>() {
        Ok(id) => Recipient::Id(teloxide::types::ChatId(id)),
        Err(_) => Recipient::ChannelUsername(channel.to_string()),
    }
}

/// `true` when the user may proceed. Sends a join prompt otherwise.
///
/// Lookup failures (bot not in the channel, API errors) let the user through.
pub(super) async fn ensure_member(
    bot: &Bot,
    state: &AppState,
    chat_id: teloxide::types::ChatId,
    user_id: teloxide::types::UserId,
) -> bool {
    let Some(channel) = state.cfg.force_join_channel.as_deref() else {
        return true;
    };

    match bot.get_chat_member(recipient(channel), user_id).await {
        Ok(member) if member.kind.is_present() => true,
        Ok(_) => {
            let text = format!("🔒 Please join {channel} to use this bot, then try again.");
            let mut req = bot.send_message(chat_id, text);
            if let Some(url) = channel_link(channel) {
                req = req.reply_markup(InlineKeyboardMarkup::new([[InlineKeyboardButton::url(
                    "📢 Join channel",
                    url,
                )]]));
            }
            let _ = req.await;
            false
        }
        Err(e) => {
            tracing::warn!(channel, error = %e, "membership check failed; allowing user");
            true
        }
    }
}
