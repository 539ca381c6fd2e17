//! Pagination callback events.
//!
//! Callback data is decoded once, at the transport boundary, into `NavEvent`.
//! Wire format: `pg:<session>:<page>` and `noop:<session>`.

use std::fmt;

use crate::{
    domain::SessionId,
    messaging::types::{InlineButton, InlineKeyboard},
    paginate::Page,
};

const PAGE_TAG: &str = "pg";
const NOOP_TAG: &str = "noop";

/// Telegram rejects callback data above 64 bytes.
pub const MAX_CALLBACK_DATA: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NavEvent {
    /// Show `page` (any integer; clamped later).
    Page { session: SessionId, page: i64 },
    /// Disabled button; acknowledge and do nothing.
    Noop { session: SessionId },
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("empty callback data")]
    Empty,
    #[error("unknown callback action: {0}")]
    UnknownAction(String),
    #[error("callback data has no session id")]
    MissingSession,
    #[error("callback data has no page number")]
    MissingPage,
    #[error("page number is not numeric: {0}")]
    NonNumericPage(String),
    #[error("unexpected trailing callback data")]
    Trailing,
}

impl NavEvent {
    pub fn session(&self) -> &SessionId {
        match self {
            NavEvent::Page { session, .. } | NavEvent::Noop { session } => session,
        }
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn decode(data: &str) -> Result<Self, NavigationError> {
        if data.trim().is_empty() {
            return Err(NavigationError::Empty);
        }

        let mut parts = data.split(':');
        let action = parts.next().unwrap_or_default();
        let session = match parts.next() {
            Some(s) if !s.is_empty() => SessionId(s.to_string()),
            _ if action == PAGE_TAG || action == NOOP_TAG => {
                return Err(NavigationError::MissingSession)
            }
            _ => return Err(NavigationError::UnknownAction(action.to_string())),
        };

        let event = match action {
            PAGE_TAG => {
                let raw = match parts.next() {
                    Some(p) if !p.trim().is_empty() => p.trim(),
                    _ => return Err(NavigationError::MissingPage),
                };
                let page = raw
                    .parse::<i64>()
                    .map_err(|_| NavigationError::NonNumericPage(raw.to_string()))?;
                NavEvent::Page { session, page }
            }
            NOOP_TAG => NavEvent::Noop { session },
            other => return Err(NavigationError::UnknownAction(other.to_string())),
        };

        if parts.next().is_some() {
            return Err(NavigationError::Trailing);
        }
        Ok(event)
    }
}

impl fmt::Display for NavEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavEvent::Page { session, page } => write!(f, "{PAGE_TAG}:{session}:{page}"),
            NavEvent::Noop { session } => write!(f, "{NOOP_TAG}:{session}"),
        }
    }
}

/// Prev / position / next row for `page`. `None` when there is a single page.
///
/// Disabled directions become no-op buttons so the row keeps its shape.
pub fn pagination_keyboard(session: &SessionId, page: &Page) -> Option<InlineKeyboard> {
    if page.total_pages <= 1 {
        return None;
    }

    let noop = || NavEvent::Noop {
        session: session.clone(),
    };
    let target = |p: usize| NavEvent::Page {
        session: session.clone(),
        page: p as i64,
    };

    let prev = if page.has_prev() {
        target(page.page_number - 1)
    } else {
        noop()
    };
    let next = if page.has_next() {
        target(page.page_number + 1)
    } else {
        noop()
    };

    Some(InlineKeyboard::row(vec![
        InlineButton::new("⬅️ Previous", prev.encode()),
        InlineButton::new(
            format!("{} / {}", page.page_number, page.total_pages),
            noop().encode(),
        ),
        InlineButton::new("Next ➡️", next.encode()),
    ]))
}
