//! Turn engine outcomes into messages.

use std::time::Duration;

use crate::{
    domain::{ChatId, MessageRef, SessionId, UserId},
    engine::{Navigation, Submission},
    messaging::port::MessagingPort,
    navigation::pagination_keyboard,
    report::{render_degraded, render_page, render_summary_only, SESSION_EXPIRED},
    Result,
};

fn effective_limit(messenger: &dyn MessagingPort, limit: usize) -> usize {
    limit.min(messenger.capabilities().max_message_len).max(1)
}

/// Send the first report for a submission. Paged results carry a keyboard.
pub async fn send_submission(
    messenger: &dyn MessagingPort,
    chat_id: ChatId,
    submission: &Submission,
    limit: usize,
) -> Result<MessageRef> {
    let limit = effective_limit(messenger, limit);
    match submission {
        Submission::SummaryOnly(result) => {
            messenger
                .send_html(chat_id, &render_summary_only(&result.summary()))
                .await
        }
        Submission::Degraded { invalid_count, .. } => {
            messenger
                .send_html(chat_id, &render_degraded(*invalid_count))
                .await
        }
        Submission::Paged {
            session_id,
            page,
            summary,
        } => {
            let text = render_page(summary, page, limit);
            match pagination_keyboard(session_id, page) {
                Some(kb) => messenger.send_inline_keyboard(chat_id, &text, kb).await,
                None => messenger.send_html(chat_id, &text).await,
            }
        }
    }
}

/// Re-render `msg` in place for a navigation result.
pub async fn show_navigation(
    messenger: &dyn MessagingPort,
    msg: MessageRef,
    session_id: &SessionId,
    navigation: &Navigation,
    limit: usize,
) -> Result<()> {
    let limit = effective_limit(messenger, limit);
    match navigation {
        Navigation::SessionNotFound => messenger.edit_html(msg, SESSION_EXPIRED).await,
        Navigation::Page { page, summary } => {
            let text = render_page(summary, page, limit);
            match pagination_keyboard(session_id, page) {
                Some(kb) => messenger.edit_inline_keyboard(msg, &text, kb).await,
                None => messenger.edit_html(msg, &text).await,
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub failed: usize,
}

/// Send `html` to every recipient, one message per `interval`.
///
/// Failures (blocked bot, deleted account) are counted and skipped.
pub async fn broadcast(
    messenger: &dyn MessagingPort,
    recipients: &[UserId],
    html: &str,
    interval: Duration,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    for (i, user) in recipients.iter().enumerate() {
        if i > 0 && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
        // Private chat id == user id.
        match messenger.send_html(ChatId(user.0), html).await {
            Ok(_) => report.sent += 1,
            Err(e) => {
                tracing::debug!(user = user.0, error = %e, "broadcast delivery failed");
                report.failed += 1;
            }
        }
    }
    tracing::info!(sent = report.sent, failed = report.failed, "broadcast finished");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{ComparisonResult, Summary};
    use crate::domain::MessageId;
    use crate::errors::Error;
    use crate::messaging::types::{
        ChatAction, InlineKeyboard, MessagingCapabilities, OutgoingDocument,
    };
    use crate::navigation::NavEvent;
    use crate::normalize::Normalizer;
    use crate::paginate::paginate_slice;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Html(ChatId, String),
        Keyboard(ChatId, String, InlineKeyboard),
        Edit(MessageRef, String),
        EditKeyboard(MessageRef, String, InlineKeyboard),
    }

    #[derive(Default)]
    struct FakeMessenger {
        next_id: Mutex<i32>,
        log: Mutex<Vec<Sent>>,
        reject_chat: Option<ChatId>,
    }

    impl FakeMessenger {
        fn alloc(&self, chat_id: ChatId) -> MessageRef {
            let mut guard = self.next_id.lock().unwrap();
            *guard += 1;
            MessageRef {
                chat_id,
                message_id: MessageId(*guard),
            }
        }

        fn log(&self) -> Vec<Sent> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                supports_html: true,
                supports_edit: true,
                supports_inline_keyboards: true,
                max_message_len: 4096,
            }
        }

        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
            if Some(chat_id) == self.reject_chat {
                return Err(Error::External("bot was blocked by the user".to_string()));
            }
            self.log
                .lock()
                .unwrap()
                .push(Sent::Html(chat_id, html.to_string()));
            Ok(self.alloc(chat_id))
        }

        async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
            self.log.lock().unwrap().push(Sent::Edit(msg, html.to_string()));
            Ok(())
        }

        async fn send_chat_action(&self, _chat_id: ChatId, _action: ChatAction) -> Result<()> {
            Ok(())
        }

        async fn send_inline_keyboard(
            &self,
            chat_id: ChatId,
            html: &str,
            keyboard: InlineKeyboard,
        ) -> Result<MessageRef> {
            self.log
                .lock()
                .unwrap()
                .push(Sent::Keyboard(chat_id, html.to_string(), keyboard));
            Ok(self.alloc(chat_id))
        }

        async fn edit_inline_keyboard(
            &self,
            msg: MessageRef,
            html: &str,
            keyboard: InlineKeyboard,
        ) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(Sent::EditKeyboard(msg, html.to_string(), keyboard));
            Ok(())
        }

        async fn send_document(&self, chat_id: ChatId, _doc: OutgoingDocument) -> Result<MessageRef> {
            Ok(self.alloc(chat_id))
        }

        async fn answer_callback_query(&self, _callback_id: &str, _text: Option<&str>) -> Result<()> {
            Ok(())
        }
    }

    fn sid() -> SessionId {
        SessionId("ffffffffffffffffffffffffffffffff".to_string())
    }

    fn paged(n: usize, page: i64) -> Submission {
        let norm = Normalizer::default();
        let items: Vec<_> = (0..n)
            .map(|i| norm.normalize(&(7000 + i).to_string()).unwrap())
            .collect();
        Submission::Paged {
            session_id: sid(),
            page: paginate_slice(&items, 50, page),
            summary: Summary {
                total: n,
                matched_count: 0,
                invalid_count: 0,
            },
        }
    }

    #[tokio::test]
    async fn multi_page_submission_sends_keyboard() {
        let m = FakeMessenger::default();
        send_submission(&m, ChatId(1), &paged(120, 1), 4000)
            .await
            .unwrap();
        let log = m.log();
        let Sent::Keyboard(chat, text, kb) = &log[0] else {
            panic!("expected a keyboard message");
        };
        assert_eq!(*chat, ChatId(1));
        assert!(text.contains("Page 1 / 3"));
        assert_eq!(
            NavEvent::decode(&kb.rows[0][2].callback_data).unwrap(),
            NavEvent::Page {
                session: sid(),
                page: 2
            }
        );
    }

    #[tokio::test]
    async fn single_page_submission_is_plain() {
        let m = FakeMessenger::default();
        send_submission(&m, ChatId(1), &paged(3, 1), 4000)
            .await
            .unwrap();
        assert!(matches!(&m.log()[0], Sent::Html(_, t) if t.contains("Page 1 / 1")));
    }

    #[tokio::test]
    async fn summary_and_degraded_are_plain_messages() {
        let m = FakeMessenger::default();
        let all_matched = Submission::SummaryOnly(ComparisonResult {
            total: 2,
            matched_count: 2,
            invalid_count: 0,
            unmatched: vec![],
        });
        send_submission(&m, ChatId(1), &all_matched, 4000)
            .await
            .unwrap();
        send_submission(
            &m,
            ChatId(1),
            &Submission::Degraded {
                reason: "timeout".to_string(),
                invalid_count: 0,
            },
            4000,
        )
        .await
        .unwrap();

        let log = m.log();
        assert!(matches!(&log[0], Sent::Html(_, t) if t.contains("All numbers are registered")));
        assert!(matches!(&log[1], Sent::Html(_, t) if t.contains("unreachable")));
    }

    #[tokio::test]
    async fn expired_navigation_edits_in_notice() {
        let m = FakeMessenger::default();
        let msg = MessageRef {
            chat_id: ChatId(1),
            message_id: MessageId(9),
        };
        show_navigation(&m, msg, &sid(), &Navigation::SessionNotFound, 4000)
            .await
            .unwrap();
        assert_eq!(m.log(), vec![Sent::Edit(msg, SESSION_EXPIRED.to_string())]);
    }

    #[tokio::test]
    async fn navigation_edits_text_and_keyboard() {
        let m = FakeMessenger::default();
        let msg = MessageRef {
            chat_id: ChatId(1),
            message_id: MessageId(9),
        };
        let Submission::Paged { page, summary, .. } = paged(120, 3) else {
            unreachable!();
        };
        let nav = Navigation::Page { page, summary };
        show_navigation(&m, msg, &sid(), &nav, 4000).await.unwrap();
        let log = m.log();
        let Sent::EditKeyboard(edited, text, _) = &log[0] else {
            panic!("expected a keyboard edit");
        };
        assert_eq!(*edited, msg);
        assert!(text.contains("Page 3 / 3"));
        assert!(text.contains("101. 7100"));
    }

    #[tokio::test]
    async fn broadcast_counts_failures() {
        let m = FakeMessenger {
            reject_chat: Some(ChatId(2)),
            ..FakeMessenger::default()
        };
        let report = broadcast(
            &m,
            &[UserId(1), UserId(2), UserId(3)],
            "hello",
            Duration::ZERO,
        )
        .await;
        assert_eq!(report, BroadcastReport { sent: 2, failed: 1 });
    }
}
