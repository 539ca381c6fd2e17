//! Report rendering (Telegram HTML subset).
//!
//! Every function here is pure: identical inputs give identical output.

use crate::{compare::Summary, paginate::Page, usage::TopUser};

pub const SESSION_EXPIRED: &str =
    "⚠️ Session expired or not found. Please send the numbers again.";

pub const REGISTRY_UNAVAILABLE: &str =
    "⚠️ The number database is unreachable right now. Nothing was checked, please try again later.";

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn header_lines(summary: &Summary) -> Vec<String> {
    let mut lines = vec![
        "📊 <b>Comparison Report</b>".to_string(),
        String::new(),
        format!("📁 Total numbers: {}", summary.total),
        format!("✅ Registered: {}", summary.matched_count),
        format!("❌ Not registered: {}", summary.unmatched_count()),
    ];
    if summary.invalid_count > 0 {
        lines.push(format!(
            "⚠️ Invalid entries skipped: {}",
            summary.invalid_count
        ));
    }
    lines
}

fn omitted_marker(omitted: usize) -> String {
    format!("… {omitted} more on this page not shown (message size limit)")
}

/// Header, page line, then the enumerated page body.
///
/// `limit` is measured in characters. When the body does not fit, trailing
/// lines are dropped and a marker with the exact omitted count is appended.
pub fn render_page(summary: &Summary, page: &Page, limit: usize) -> String {
    let mut head = header_lines(summary);
    head.push(String::new());
    head.push(format!(
        "📄 Page {} / {}",
        page.page_number, page.total_pages
    ));
    head.push(String::new());
    let head = head.join("\n");

    let body: Vec<String> = page
        .items
        .iter()
        .enumerate()
        .map(|(i, id)| format!("{}. {}", page.first_index + i + 1, id))
        .collect();

    let head_len = head.chars().count();
    // prefix[k] = chars used by the first k body lines, each followed by '\n'.
    let mut prefix = Vec::with_capacity(body.len() + 1);
    prefix.push(0usize);
    for line in &body {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + line.chars().count() + 1);
    }

    let full = head_len + prefix[body.len()].saturating_sub(1);
    if full <= limit {
        return format!("{head}{}", body.join("\n"));
    }
    if body.is_empty() {
        return compact_page_line(summary, page).chars().take(limit).collect();
    }

    let mut keep = 0usize;
    for k in (0..body.len()).rev() {
        let marker = omitted_marker(body.len() - k);
        if head_len + prefix[k] + marker.chars().count() <= limit {
            keep = k;
            break;
        }
    }

    let mut out = head;
    for line in &body[..keep] {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&omitted_marker(body.len() - keep));

    if out.chars().count() > limit {
        // Limit smaller than the header itself: plain text only, no markup to split.
        return compact_page_line(summary, page).chars().take(limit).collect();
    }
    out
}

fn compact_page_line(summary: &Summary, page: &Page) -> String {
    format!(
        "Page {}/{}: {} not registered of {}",
        page.page_number,
        page.total_pages,
        summary.unmatched_count(),
        summary.total
    )
}

/// Report when nothing is left to page through.
pub fn render_summary_only(summary: &Summary) -> String {
    if summary.total == 0 {
        let mut out = "❌ No valid numbers found. Send one number per line, or separate them with commas.".to_string();
        if summary.invalid_count > 0 {
            out.push_str(&format!(
                "\n\n⚠️ Invalid entries skipped: {}",
                summary.invalid_count
            ));
        }
        return out;
    }

    let mut lines = header_lines(summary);
    lines.push(String::new());
    lines.push("🎉 All numbers are registered!".to_string());
    lines.join("\n")
}

pub fn render_degraded(invalid_count: usize) -> String {
    if invalid_count == 0 {
        return REGISTRY_UNAVAILABLE.to_string();
    }
    format!("{REGISTRY_UNAVAILABLE}\n\n⚠️ Invalid entries in your input: {invalid_count}")
}

/// One-line answer for a single-number lookup.
pub fn render_lookup(number: &str, registered: bool) -> String {
    if registered {
        format!("✅ {number} is registered.")
    } else {
        format!("❌ {number} not found in database.")
    }
}

pub fn render_stats(registry_count: usize, user_count: usize, live_sessions: usize) -> String {
    format!(
        "📊 <b>Bot Stats</b>\n\n📞 Numbers in database: {registry_count}\n👥 Users: {user_count}\n🗂 Live result sessions: {live_sessions}"
    )
}

pub fn render_usage_today(date: &str, uploads: u64) -> String {
    format!("📊 Files processed today ({}): {uploads}", escape_html(date))
}

pub fn render_top_users(users: &[TopUser]) -> String {
    if users.is_empty() {
        return "No usage data yet.".to_string();
    }
    let mut out = "🏆 <b>Top Users</b>\n".to_string();
    for (i, u) in users.iter().enumerate() {
        let who = match u.username.as_deref() {
            Some(name) if !name.is_empty() => format!("@{}", escape_html(name)),
            _ => format!("<code>{}</code>", u.user_id.0),
        };
        out.push_str(&format!("\n{}. {who}: {} files", i + 1, u.uploads));
    }
    out
}
