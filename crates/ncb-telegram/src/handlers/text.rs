use std::sync::Arc;

use teloxide::prelude::*;

use ncb_core::{
    domain::{ChatId, UserId},
    normalize::split_tokens,
};

use crate::router::AppState;

use super::submit::run_submission;

fn has_digits(tokens: &[&str]) -> bool {
    tokens.iter().any(|t| t.chars().any(|c| c.is_ascii_digit()))
}

pub async fn handle_text(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let tokens = split_tokens(text);
    if !has_digits(&tokens) {
        bot.send_message(
            msg.chat.id,
            "Send one or more numbers (comma or newline separated), or a .txt file.",
        )
        .await?;
        return Ok(());
    }

    run_submission(
        &state,
        ChatId(msg.chat.id.0),
        UserId(user.id.0 as i64),
        "text",
        &tokens,
    )
    .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_at_least_one_digit() {
        assert!(!has_digits(&split_tokens("hello, world")));
        assert!(has_digits(&split_tokens("hello\n+1 555 0100")));
        assert!(!has_digits(&[]));
    }
}
