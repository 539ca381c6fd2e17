use std::sync::Arc;

use teloxide::prelude::*;

use ncb_core::{
    delivery::show_navigation,
    domain::{ChatId, MessageId, MessageRef},
    navigation::NavEvent,
};

use crate::router::AppState;

pub async fn handle_callback(
    _bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let event = match NavEvent::decode(q.data.as_deref().unwrap_or_default()) {
        Ok(ev) => ev,
        Err(e) => {
            tracing::debug!(user = q.from.id.0, error = %e, "rejected callback data");
            let _ = state
                .messenger
                .answer_callback_query(&q.id, Some("Invalid request"))
                .await;
            return Ok(());
        }
    };

    // Always answer first so the client stops its spinner.
    let _ = state.messenger.answer_callback_query(&q.id, None).await;

    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let msg = MessageRef {
        chat_id: ChatId(message.chat.id.0),
        message_id: MessageId(message.id.0),
    };

    match event {
        NavEvent::Noop { .. } => {}
        NavEvent::Page { session, page } => {
            let navigation = state.engine.navigate(&session, page).await;
            if let Err(e) = show_navigation(
                state.messenger.as_ref(),
                msg,
                &session,
                &navigation,
                state.engine.message_size_limit(),
            )
            .await
            {
                tracing::warn!(session = %session, error = %e, "failed to update report page");
            }
        }
    }
    Ok(())
}
