use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{
        InlineQuery, InlineQueryResult, InlineQueryResultArticle, InputMessageContent,
        InputMessageContentText,
    },
};

use ncb_core::{
    engine::Lookup,
    report::{render_lookup, REGISTRY_UNAVAILABLE},
};

use crate::router::AppState;

fn lookup_text(lookup: &Lookup) -> String {
    match lookup {
        Lookup::Registered(id) => render_lookup(id.as_str(), true),
        Lookup::NotRegistered(id) => render_lookup(id.as_str(), false),
        Lookup::Invalid => "⚠️ That does not look like a phone number.".to_string(),
        Lookup::Unavailable => REGISTRY_UNAVAILABLE.to_string(),
    }
}

pub async fn handle_inline(bot: Bot, q: InlineQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let query = q.query.trim();
    if query.is_empty() {
        return Ok(());
    }

    let text = lookup_text(&state.engine.lookup(query).await);
    let article = InlineQueryResultArticle::new(
        "lookup",
        "Check number",
        InputMessageContent::Text(InputMessageContentText::new(text.clone())),
    )
    .description(text);

    if let Err(e) = bot
        .answer_inline_query(q.id.clone(), vec![InlineQueryResult::Article(article)])
        .cache_time(0)
        .await
    {
        tracing::warn!(error = %e, "failed to answer inline query");
    }
    Ok(())
}
