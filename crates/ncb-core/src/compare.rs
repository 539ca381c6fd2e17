//! Classify a batch of raw tokens against a registry snapshot.

use std::collections::HashSet;

use crate::{domain::Identifier, normalize::Normalizer, registry::Registry};

/// Header counters shared by every rendered report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    /// Valid tokens (matched + unmatched).
    pub total: usize,
    pub matched_count: usize,
    pub invalid_count: usize,
}

impl Summary {
    pub fn unmatched_count(&self) -> usize {
        self.total - self.matched_count
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComparisonResult {
    pub total: usize,
    pub matched_count: usize,
    pub invalid_count: usize,
    /// Input order, every occurrence kept.
    pub unmatched: Vec<Identifier>,
}

impl ComparisonResult {
    pub fn summary(&self) -> Summary {
        Summary {
            total: self.total,
            matched_count: self.matched_count,
            invalid_count: self.invalid_count,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Comparison {
    Complete(ComparisonResult),
    /// The registry could not be read; nothing was classified.
    Degraded { reason: String, invalid_count: usize },
}

/// Pure classification over an already fetched snapshot.
pub fn classify<S: AsRef<str>>(
    snapshot: &HashSet<String>,
    normalizer: &Normalizer,
    tokens: &[S],
) -> ComparisonResult {
    let mut out = ComparisonResult::default();
    for raw in tokens {
        let Some(id) = normalizer.normalize(raw.as_ref()) else {
            out.invalid_count += 1;
            continue;
        };
        out.total += 1;
        if snapshot.contains(id.as_str()) {
            out.matched_count += 1;
        } else {
            out.unmatched.push(id);
        }
    }
    out
}

/// Fetch one snapshot and classify `tokens` against it.
pub async fn compare<S: AsRef<str>>(
    registry: &dyn Registry,
    normalizer: &Normalizer,
    tokens: &[S],
) -> Comparison {
    match registry.fetch_all_identifiers().await {
        Ok(snapshot) => Comparison::Complete(classify(&snapshot, normalizer, tokens)),
        Err(e) => {
            tracing::warn!(registry = registry.name(), error = %e, "registry fetch failed");
            let invalid_count = tokens
                .iter()
                .filter(|t| normalizer.normalize(t.as_ref()).is_none())
                .count();
            Comparison::Degraded {
                reason: e.to_string(),
                invalid_count,
            }
        }
    }
}
