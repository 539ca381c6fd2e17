//! `submit` / `navigate`: the surface the transport talks to.

use std::{sync::Arc, time::Instant};

use crate::{
    compare::{compare, Comparison, ComparisonResult, Summary},
    config::Config,
    domain::{Identifier, SessionId, UserId},
    normalize::{Normalizer, NormalizerConfig},
    paginate::{paginate, paginate_slice, Page},
    registry::Registry,
    session::{NewSession, SessionStore},
};

#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    pub page_size: usize,
    pub message_size_limit: usize,
    pub normalizer: NormalizerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            message_size_limit: 4000,
            normalizer: NormalizerConfig::default(),
        }
    }
}

impl From<&Config> for EngineConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            page_size: cfg.page_size,
            message_size_limit: cfg.message_size_limit,
            normalizer: cfg.normalizer,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    /// Nothing unmatched; no session was created.
    SummaryOnly(ComparisonResult),
    Paged {
        session_id: SessionId,
        page: Page,
        summary: Summary,
    },
    /// Registry fetch failed; distinct from "zero unmatched".
    Degraded { reason: String, invalid_count: usize },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
    Page { page: Page, summary: Summary },
    /// Unknown or expired; the two are not distinguished.
    SessionNotFound,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup {
    Registered(Identifier),
    NotRegistered(Identifier),
    Invalid,
    Unavailable,
}

pub struct CheckEngine {
    registry: Arc<dyn Registry>,
    sessions: Arc<SessionStore>,
    normalizer: Normalizer,
    page_size: usize,
    message_size_limit: usize,
}

impl CheckEngine {
    pub fn new(
        registry: Arc<dyn Registry>,
        sessions: Arc<SessionStore>,
        cfg: EngineConfig,
    ) -> Self {
        Self {
            registry,
            sessions,
            normalizer: Normalizer::new(cfg.normalizer),
            page_size: cfg.page_size.max(1),
            message_size_limit: cfg.message_size_limit.max(1),
        }
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn message_size_limit(&self) -> usize {
        self.message_size_limit
    }

    /// Compare `tokens` against one registry snapshot; page the unmatched part.
    pub async fn submit<S: AsRef<str>>(&self, owner: UserId, tokens: &[S]) -> Submission {
        let started = Instant::now();
        let result = match compare(self.registry.as_ref(), &self.normalizer, tokens).await {
            Comparison::Complete(r) => r,
            Comparison::Degraded {
                reason,
                invalid_count,
            } => {
                return Submission::Degraded {
                    reason,
                    invalid_count,
                }
            }
        };

        tracing::info!(
            owner = owner.0,
            total = result.total,
            matched = result.matched_count,
            unmatched = result.unmatched.len(),
            invalid = result.invalid_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "comparison finished"
        );

        if result.unmatched.is_empty() {
            return Submission::SummaryOnly(result);
        }

        let summary = result.summary();
        let page = paginate_slice(&result.unmatched, self.page_size, 1);
        let session_id = self
            .sessions
            .create(NewSession {
                owner,
                unmatched: result.unmatched,
                summary,
                page_size: self.page_size,
            })
            .await;

        Submission::Paged {
            session_id,
            page,
            summary,
        }
    }

    pub async fn navigate(&self, session_id: &SessionId, requested_page: i64) -> Navigation {
        self.navigate_at(session_id, requested_page, Instant::now())
            .await
    }

    pub async fn navigate_at(
        &self,
        session_id: &SessionId,
        requested_page: i64,
        now: Instant,
    ) -> Navigation {
        let Some(session) = self.sessions.get_at(session_id, now).await else {
            tracing::debug!(session = %session_id, "navigation on missing session");
            return Navigation::SessionNotFound;
        };
        Navigation::Page {
            page: paginate(&session, requested_page),
            summary: session.summary(),
        }
    }

    /// Single-number check, for inline queries.
    pub async fn lookup(&self, raw: &str) -> Lookup {
        let Some(id) = self.normalizer.normalize(raw) else {
            return Lookup::Invalid;
        };
        match self.registry.contains(&id).await {
            Ok(true) => Lookup::Registered(id),
            Ok(false) => Lookup::NotRegistered(id),
            Err(e) => {
                tracing::warn!(error = %e, "lookup failed");
                Lookup::Unavailable
            }
        }
    }
}
