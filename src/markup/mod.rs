//! Rich-text conversion between the two platforms' span models.
//!
//! Telegram addresses formatting with UTF-16 offset entities; MAX with
//! markup ranges in the same coordinates. This module converts either
//! set of parsed [`Span`]s into what the destination platform accepts:
//! inline Markdown for MAX, an escaped HTML subset for Telegram.
//!
//! All functions are total: malformed offsets are clamped, unknown kinds
//! dropped, and no input panics.

pub mod html;
pub mod markdown;
pub mod spans;

pub use spans::{Span, SpanKind};

use crate::common::Platform;

/// How the destination platform should interpret the rendered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    Plain,
    Markdown,
    Html,
}

/// Render `text` with `spans` the way the destination platform expects.
///
/// Without spans the text stays plain (no escaping applied), so unformatted
/// messages round-trip untouched.
pub fn render_for(dest: Platform, text: &str, spans: &[Span]) -> (String, TextMode) {
    if spans.is_empty() {
        return (text.to_string(), TextMode::Plain);
    }
    match dest {
        Platform::Max => (markdown::render(text, spans), TextMode::Markdown),
        Platform::Telegram => {
            // Spans parsed from MAX markups hop through Telegram's
            // enumeration before rendering
            let retagged = spans::retag_max_to_telegram(spans);
            (html::render(text, &retagged), TextMode::Html)
        }
    }
}
