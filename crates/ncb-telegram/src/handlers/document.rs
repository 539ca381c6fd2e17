use std::sync::Arc;

use teloxide::{net::Download, prelude::*, types::Document};

use ncb_core::{
    domain::{ChatId, UserId},
    usage::today_key,
};

use crate::router::AppState;

use super::submit::run_submission;

fn is_txt(name: &str) -> bool {
    name.to_lowercase().ends_with(".txt")
}

/// One token per non-empty line. Invalid UTF-8 is replaced, not rejected.
fn file_tokens(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

async fn download(bot: &Bot, doc: &Document) -> anyhow::Result<Vec<u8>> {
    let file = bot.get_file(doc.file.id.clone()).await?;
    let mut dst = Vec::with_capacity(file.size as usize);
    bot.download_file(&file.path, &mut dst).await?;
    Ok(dst)
}

pub async fn handle_document(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(doc) = msg.document() else {
        return Ok(());
    };

    let file_name = doc.file_name.clone().unwrap_or_default();
    if !is_txt(&file_name) {
        bot.send_message(msg.chat.id, "❌ Only .txt files are supported.")
            .await?;
        return Ok(());
    }

    let size = doc.file.size as u64;
    if size > state.cfg.max_upload_bytes {
        bot.send_message(
            msg.chat.id,
            format!(
                "❌ File too large ({:.1}MB). Max: {:.0}MB",
                size as f64 / (1024.0 * 1024.0),
                state.cfg.max_upload_bytes as f64 / (1024.0 * 1024.0)
            ),
        )
        .await?;
        return Ok(());
    }

    let bytes = match download(&bot, doc).await {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(file = %file_name, error = %e, "document download failed");
            bot.send_message(msg.chat.id, "❌ Failed to download the file. Please try again.")
                .await?;
            return Ok(());
        }
    };

    let user_id = UserId(user.id.0 as i64);
    state
        .usage
        .record_upload(user_id, user.username.as_deref(), &today_key())
        .await;

    let tokens = file_tokens(&bytes);
    if tokens.is_empty() {
        bot.send_message(msg.chat.id, "❌ The file does not contain any numbers.")
            .await?;
        return Ok(());
    }

    tracing::debug!(file = %file_name, bytes = bytes.len(), lines = tokens.len(), "document received");
    run_submission(&state, ChatId(msg.chat.id.0), user_id, "document", &tokens).await;
    Ok(())
}
