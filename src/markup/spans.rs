//! Formatting spans and the mapping between platform enumerations.
//!
//! A span annotates a half-open range of UTF-16 code units with a
//! formatting instruction. Telegram delivers these as "entities"
//! (`bold`, `text_link`, ...), MAX as "markups" (`strong`, `link`, ...).
//! Both parse into the same [`Span`] type; the `*_kind` functions are the
//! pure re-tagging between the two enumerations. Kinds one side cannot
//! represent are dropped, never errors.

/// Formatting instruction carried by a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanKind {
    Bold,
    Italic,
    /// Inline monospace.
    Code,
    /// Block monospace. MAX has no block form; it maps to `monospaced`
    /// and comes back as [`SpanKind::Code`].
    Pre,
    Strike,
    Underline,
    Link { url: String },
}

/// A formatting annotation over `[start, end)` in UTF-16 code units.
///
/// Spans are transient: constructed per message, never persisted.
/// Out-of-range offsets are clamped by the renderers, not rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub kind: SpanKind,
}

impl Span {
    pub fn new(start: usize, end: usize, kind: SpanKind) -> Self {
        Self { start, end, kind }
    }
}

/// Parse a Telegram entity type. Returns None for kinds the bridge drops
/// (mentions, hashtags, spoilers, ...).
pub fn parse_telegram_kind(kind: &str, url: Option<&str>) -> Option<SpanKind> {
    match kind {
        "bold" => Some(SpanKind::Bold),
        "italic" => Some(SpanKind::Italic),
        "code" => Some(SpanKind::Code),
        "pre" => Some(SpanKind::Pre),
        "strikethrough" => Some(SpanKind::Strike),
        "underline" => Some(SpanKind::Underline),
        "text_link" => url.map(|u| SpanKind::Link { url: u.to_string() }),
        _ => None,
    }
}

/// Telegram entity type for a span kind.
pub fn telegram_kind(kind: &SpanKind) -> &'static str {
    match kind {
        SpanKind::Bold => "bold",
        SpanKind::Italic => "italic",
        SpanKind::Code => "code",
        SpanKind::Pre => "pre",
        SpanKind::Strike => "strikethrough",
        SpanKind::Underline => "underline",
        SpanKind::Link { .. } => "text_link",
    }
}

/// Parse a MAX markup type. Returns None for kinds the bridge drops
/// (`user_mention`, `heading`, ...).
pub fn parse_max_kind(kind: &str, url: Option<&str>) -> Option<SpanKind> {
    match kind {
        "strong" => Some(SpanKind::Bold),
        "emphasized" => Some(SpanKind::Italic),
        "monospaced" => Some(SpanKind::Code),
        "strikethrough" => Some(SpanKind::Strike),
        "underline" => Some(SpanKind::Underline),
        "link" => url.map(|u| SpanKind::Link { url: u.to_string() }),
        _ => None,
    }
}

/// MAX markup type for a span kind. `code` and `pre` both collapse to
/// `monospaced`.
pub fn max_kind(kind: &SpanKind) -> &'static str {
    match kind {
        SpanKind::Bold => "strong",
        SpanKind::Italic => "emphasized",
        SpanKind::Code | SpanKind::Pre => "monospaced",
        SpanKind::Strike => "strikethrough",
        SpanKind::Underline => "underline",
        SpanKind::Link { .. } => "link",
    }
}

/// Re-tag spans from Telegram's enumeration into MAX's, preserving
/// offsets and URLs. Kinds without a MAX counterpart are dropped.
pub fn retag_telegram_to_max(spans: &[Span]) -> Vec<Span> {
    spans
        .iter()
        .filter_map(|s| {
            let url = match &s.kind {
                SpanKind::Link { url } => Some(url.as_str()),
                _ => None,
            };
            parse_max_kind(max_kind(&s.kind), url).map(|kind| Span::new(s.start, s.end, kind))
        })
        .collect()
}

/// Re-tag spans from MAX's enumeration into Telegram's, preserving
/// offsets and URLs. Kinds without a Telegram counterpart are dropped.
pub fn retag_max_to_telegram(spans: &[Span]) -> Vec<Span> {
    spans
        .iter()
        .filter_map(|s| {
            let url = match &s.kind {
                SpanKind::Link { url } => Some(url.as_str()),
                _ => None,
            };
            parse_telegram_kind(telegram_kind(&s.kind), url)
                .map(|kind| Span::new(s.start, s.end, kind))
        })
        .collect()
}

/// Sort spans by start offset; ties keep declaration order (stable sort).
pub fn sorted_by_start(spans: &[Span]) -> Vec<&Span> {
    let mut sorted: Vec<&Span> = spans.iter().collect();
    sorted.sort_by_key(|s| s.start);
    sorted
}
