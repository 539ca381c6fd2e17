//! Slice a session's unmatched sequence into pages.

use crate::{domain::Identifier, session::Session};

/// One page of a session. Derived, never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<Identifier>,
    /// 1-based, already clamped.
    pub page_number: usize,
    pub total_pages: usize,
    /// Offset of `items[0]` in the full sequence.
    pub first_index: usize,
}

impl Page {
    pub fn has_prev(&self) -> bool {
        self.page_number > 1
    }

    pub fn has_next(&self) -> bool {
        self.page_number < self.total_pages
    }
}

/// Clamp `requested` into `[1, total_pages]` and slice.
pub fn paginate(session: &Session, requested: i64) -> Page {
    paginate_slice(&session.unmatched, session.page_size, requested)
}

pub fn paginate_slice(items: &[Identifier], page_size: usize, requested: i64) -> Page {
    let page_size = page_size.max(1);
    let total_pages = items.len().div_ceil(page_size).max(1);

    let page_number = clamp_page(requested, total_pages);
    let start = (page_number - 1) * page_size;
    let end = (start + page_size).min(items.len());
    let start = start.min(end);

    Page {
        items: items[start..end].to_vec(),
        page_number,
        total_pages,
        first_index: start,
    }
}

fn clamp_page(requested: i64, total_pages: usize) -> usize {
    if requested < 1 {
        return 1;
    }
    usize::try_from(requested)
        .unwrap_or(usize::MAX)
        .min(total_pages)
}
