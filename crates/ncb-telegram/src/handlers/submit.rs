use std::time::Instant;

use ncb_core::{
    delivery::send_submission,
    domain::{ChatId, UserId},
    engine::Submission,
    messaging::types::ChatAction,
};

use crate::router::AppState;

/// Compare `tokens` for `owner` and deliver the first report to `chat_id`.
pub(super) async fn run_submission<S: AsRef<str> + Sync>(
    state: &AppState,
    chat_id: ChatId,
    owner: UserId,
    source: &'static str,
    tokens: &[S],
) {
    let _ = state
        .messenger
        .send_chat_action(chat_id, ChatAction::Typing)
        .await;

    let started = Instant::now();
    let submission = state.engine.submit(owner, tokens).await;
    if let Submission::Degraded { reason, .. } = &submission {
        tracing::warn!(owner = owner.0, source, %reason, "submission degraded");
    }

    if let Err(e) = send_submission(
        state.messenger.as_ref(),
        chat_id,
        &submission,
        state.engine.message_size_limit(),
    )
    .await
    {
        tracing::warn!(chat = chat_id.0, error = %e, "failed to deliver report");
        return;
    }

    tracing::info!(
        owner = owner.0,
        source,
        tokens = tokens.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "report delivered"
    );
}
