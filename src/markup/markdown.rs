//! Span rendering to inline Markdown for MAX.
//!
//! Offsets are UTF-16 code units (Telegram's addressing). Whitespace at
//! the edges of a span is moved outside the markers so the MAX renderer
//! does not see formatting that starts or ends on a space.

use super::spans::{sorted_by_start, Span, SpanKind};

/// Render `text` with `spans` as Markdown.
///
/// Spans are processed in start order (ties in declaration order); the
/// output cursor never moves backwards, so overlapping spans degrade to
/// sequential ranges instead of duplicating text. Offsets outside the
/// text are clamped. Kinds Markdown cannot express (underline) are
/// dropped; their text is emitted unformatted.
pub fn render(text: &str, spans: &[Span]) -> String {
    if spans.is_empty() {
        return text.to_string();
    }

    let units: Vec<u16> = text.encode_utf16().collect();
    let len = units.len();

    let mut out = String::new();
    let mut pos = 0usize;

    for span in sorted_by_start(spans) {
        let (open, close) = match tokens(&span.kind) {
            Some(t) => t,
            None => continue,
        };

        let start = span.start.min(len).max(pos);
        let end = span.end.min(len);

        if start > pos {
            out.push_str(&decode(&units[pos..start]));
            pos = start;
        }
        if end <= start {
            continue;
        }

        let inner = decode(&units[start..end]);

        // Displace edge whitespace outside the markers
        let kept_right = inner.trim_end_matches([' ', '\t', '\n']);
        let trailing = &inner[kept_right.len()..];
        let kept = kept_right.trim_start_matches([' ', '\t', '\n']);
        let leading = &kept_right[..kept_right.len() - kept.len()];

        out.push_str(leading);
        if !kept.is_empty() {
            out.push_str(&open);
            out.push_str(kept);
            out.push_str(&close);
        }
        out.push_str(trailing);

        pos = end;
    }

    if pos < len {
        out.push_str(&decode(&units[pos..]));
    }

    out
}

/// Opening and closing marker for a span kind; None when Markdown has no
/// representation.
fn tokens(kind: &SpanKind) -> Option<(String, String)> {
    let pair = match kind {
        SpanKind::Bold => ("**".to_string(), "**".to_string()),
        SpanKind::Italic => ("_".to_string(), "_".to_string()),
        SpanKind::Code => ("`".to_string(), "`".to_string()),
        SpanKind::Pre => ("```\n".to_string(), "\n```".to_string()),
        SpanKind::Strike => ("~~".to_string(), "~~".to_string()),
        SpanKind::Link { url } => ("[".to_string(), format!("]({})", url)),
        SpanKind::Underline => return None,
    };
    Some(pair)
}

fn decode(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}
