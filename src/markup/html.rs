//! Span rendering to the Telegram-compatible HTML subset.
//!
//! Builds a flat event list of (position, open/close, tag) entries,
//! sorted by UTF-16 position with closing tags before opening tags at
//! equal positions, then walks the text one code unit at a time emitting
//! queued tags and escaped characters. Surrogate pairs are reassembled
//! into single characters before escaping; a lone surrogate degrades to
//! the replacement character.

use super::spans::{Span, SpanKind};

struct TagEvent {
    pos: usize,
    open: bool,
    tag: String,
}

/// Render `text` with `spans` as escaped HTML.
pub fn render(text: &str, spans: &[Span]) -> String {
    let units: Vec<u16> = text.encode_utf16().collect();
    let len = units.len();

    if spans.is_empty() {
        let mut out = String::with_capacity(text.len());
        for ch in text.chars() {
            push_escaped(&mut out, ch);
        }
        return out;
    }

    let mut events: Vec<TagEvent> = Vec::with_capacity(spans.len() * 2);
    for span in spans {
        let (open_tag, close_tag) = tags(&span.kind);
        let start = span.start.min(len);
        let end = span.end.min(len).max(start);
        events.push(TagEvent {
            pos: start,
            open: true,
            tag: open_tag,
        });
        events.push(TagEvent {
            pos: end,
            open: false,
            tag: close_tag,
        });
    }

    // Position ascending; at equal positions close before open (stable
    // sort keeps declaration order within each group)
    events.sort_by(|a, b| a.pos.cmp(&b.pos).then(a.open.cmp(&b.open)));

    let mut out = String::with_capacity(text.len() + spans.len() * 8);
    let mut next_event = 0;
    let mut i = 0;
    while i <= len {
        while next_event < events.len() && events[next_event].pos <= i {
            out.push_str(&events[next_event].tag);
            next_event += 1;
        }
        if i >= len {
            break;
        }

        let unit = units[i];
        if is_high_surrogate(unit) && i + 1 < len && is_low_surrogate(units[i + 1]) {
            for ch in String::from_utf16_lossy(&units[i..i + 2]).chars() {
                push_escaped(&mut out, ch);
            }
            i += 2;
        } else {
            // Lone surrogates decode to U+FFFD
            for ch in String::from_utf16_lossy(&units[i..i + 1]).chars() {
                push_escaped(&mut out, ch);
            }
            i += 1;
        }
    }

    out
}

/// Opening and closing tag for a span kind. Every codec kind has an HTML
/// form.
fn tags(kind: &SpanKind) -> (String, String) {
    match kind {
        SpanKind::Bold => ("<b>".to_string(), "</b>".to_string()),
        SpanKind::Italic => ("<i>".to_string(), "</i>".to_string()),
        SpanKind::Code => ("<code>".to_string(), "</code>".to_string()),
        SpanKind::Pre => ("<pre>".to_string(), "</pre>".to_string()),
        SpanKind::Strike => ("<s>".to_string(), "</s>".to_string()),
        SpanKind::Underline => ("<u>".to_string(), "</u>".to_string()),
        SpanKind::Link { url } => (
            format!("<a href=\"{}\">", escape(url)),
            "</a>".to_string(),
        ),
    }
}

fn is_high_surrogate(unit: u16) -> bool {
    (0xD800..0xDC00).contains(&unit)
}

fn is_low_surrogate(unit: u16) -> bool {
    (0xDC00..0xE000).contains(&unit)
}

fn push_escaped(out: &mut String, ch: char) {
    match ch {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&#39;"),
        _ => out.push(ch),
    }
}

/// Escape a full string (used for URL attribute values).
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        push_escaped(&mut out, ch);
    }
    out
}
