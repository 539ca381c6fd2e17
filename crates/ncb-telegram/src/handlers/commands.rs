use std::sync::Arc;

use teloxide::prelude::*;

use ncb_core::{
    delivery::broadcast,
    domain::{ChatId, UserId},
    messaging::types::{ChatAction, OutgoingDocument},
    report::{
        escape_html, render_stats, render_top_users, render_usage_today, REGISTRY_UNAVAILABLE,
    },
    security::is_admin,
    usage::today_key,
};

use crate::router::AppState;

const TOP_USERS_LIMIT: usize = 10;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

fn is_admin_command(cmd: &str) -> bool {
    matches!(
        cmd,
        "stats" | "usage" | "topusers" | "broadcast" | "add" | "remove" | "exportdb"
    )
}

fn help_text(state: &AppState, admin: bool) -> String {
    let mut body = format!(
        "🤖 <b>Number Check Bot</b>\n\n\
Send me a <code>.txt</code> file with one number per line, or paste numbers \
separated by commas or new lines. I will report which ones are not registered.\n\n\
Results are paged {} numbers at a time and stay available for {} minutes.\n\
In any chat, type <code>@bot number</code> to check a single number.",
        state.engine.page_size(),
        state.engine.sessions().ttl().as_secs() / 60,
    );
    if let Some(channel) = state.cfg.force_join_channel.as_deref() {
        body.push_str(&format!(
            "\n\n📢 Channel membership required: {}",
            escape_html(channel)
        ));
    }
    if admin {
        body.push_str(
            "\n\n<b>🛠 Admin:</b>\n\
/stats - Database and user counts\n\
/usage - Files processed today\n\
/topusers - Top uploaders\n\
/broadcast &lt;text&gt; - Message every user\n\
/add &lt;number&gt; - Register a number\n\
/remove &lt;number&gt; - Unregister a number\n\
/exportdb - Download the database",
        );
    }
    body
}

async fn reply(state: &AppState, chat_id: ChatId, html: &str) {
    if let Err(e) = state.messenger.send_html(chat_id, html).await {
        tracing::warn!(chat = chat_id.0, error = %e, "failed to send reply");
    }
}

pub async fn handle_command(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let user_id = UserId(user.id.0 as i64);
    let chat_id = ChatId(msg.chat.id.0);
    let admin = is_admin(Some(user_id), &state.cfg.admin_ids);
    let (cmd, arg) = parse_command(text);

    if is_admin_command(&cmd) && !admin {
        tracing::info!(user = user_id.0, cmd = %cmd, "admin command refused");
        reply(&state, chat_id, "🚫 Admin only.").await;
        return Ok(());
    }

    match cmd.as_str() {
        "start" | "help" => {
            reply(&state, chat_id, &help_text(&state, admin)).await;
        }

        "stats" => {
            let body = match state.engine.registry().count().await {
                Ok(n) => render_stats(
                    n,
                    state.usage.user_count().await,
                    state.engine.sessions().len().await,
                ),
                Err(e) => {
                    tracing::warn!(error = %e, "registry count failed");
                    REGISTRY_UNAVAILABLE.to_string()
                }
            };
            reply(&state, chat_id, &body).await;
        }

        "usage" => {
            let today = today_key();
            let uploads = state.usage.uploads_on(&today).await;
            reply(&state, chat_id, &render_usage_today(&today, uploads)).await;
        }

        "topusers" => {
            let top = state.usage.top_users(TOP_USERS_LIMIT).await;
            reply(&state, chat_id, &render_top_users(&top)).await;
        }

        "broadcast" => {
            if arg.is_empty() {
                reply(&state, chat_id, "Usage: /broadcast &lt;message&gt;").await;
                return Ok(());
            }
            let recipients = state.usage.user_ids().await;
            reply(
                &state,
                chat_id,
                &format!("📣 Broadcasting to {} users…", recipients.len()),
            )
            .await;
            let report = broadcast(
                state.messenger.as_ref(),
                &recipients,
                &escape_html(&arg),
                state.cfg.broadcast_interval,
            )
            .await;
            reply(
                &state,
                chat_id,
                &format!(
                    "✅ Broadcast sent to {} users ({} failed)",
                    report.sent, report.failed
                ),
            )
            .await;
        }

        "add" | "remove" => {
            let Some(id) = state.engine.normalizer().normalize(&arg) else {
                reply(&state, chat_id, &format!("Usage: /{cmd} &lt;number&gt;")).await;
                return Ok(());
            };
            let registry = state.engine.registry();
            let outcome = if cmd == "add" {
                registry.insert(&id).await
            } else {
                registry.remove(&id).await
            };
            let body = match (cmd.as_str(), outcome) {
                ("add", Ok(true)) => format!("✅ Added <code>{id}</code>."),
                ("add", Ok(false)) => format!("ℹ️ <code>{id}</code> is already registered."),
                (_, Ok(true)) => format!("🗑 Removed <code>{id}</code>."),
                (_, Ok(false)) => format!("ℹ️ <code>{id}</code> was not registered."),
                (_, Err(e)) => {
                    tracing::warn!(cmd = %cmd, error = %e, "registry update failed");
                    REGISTRY_UNAVAILABLE.to_string()
                }
            };
            tracing::info!(admin = user_id.0, cmd = %cmd, number = %id, "registry edited");
            reply(&state, chat_id, &body).await;
        }

        "exportdb" => {
            let ids = match state.engine.registry().fetch_all_identifiers().await {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::warn!(error = %e, "registry export failed");
                    reply(&state, chat_id, REGISTRY_UNAVAILABLE).await;
                    return Ok(());
                }
            };
            let mut ids: Vec<String> = ids.into_iter().collect();
            ids.sort();
            let mut bytes = ids.join("\n").into_bytes();
            if !bytes.is_empty() {
                bytes.push(b'\n');
            }

            let _ = state
                .messenger
                .send_chat_action(chat_id, ChatAction::UploadDocument)
                .await;
            let doc = OutgoingDocument {
                file_name: "numbers.txt".to_string(),
                bytes,
                caption: Some(format!("📦 {} numbers", ids.len())),
            };
            if let Err(e) = state.messenger.send_document(chat_id, doc).await {
                tracing::warn!(error = %e, "failed to send export");
                reply(&state, chat_id, "❌ Failed to send the export.").await;
            }
        }

        _ => {
            reply(&state, chat_id, "Unknown command. Send /help.").await;
        }
    }

    Ok(())
}
