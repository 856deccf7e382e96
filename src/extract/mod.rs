pub mod chrome;
pub mod commerce;
pub mod sections;

use std::sync::LazyLock;

use regex::Regex;

use crate::schema::CandidateBlock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h([1-3])[^>]*>(.*?)</h[1-3]>").unwrap());

/// A candidate tied to its byte range in the source markup, so overlaps can
/// be resolved and document order preserved.
#[derive(Debug, Clone)]
pub struct Spanned {
    pub start: usize,
    pub end: usize,
    pub block: CandidateBlock,
}

/// Everything the extractors found on one page.
#[derive(Debug)]
pub struct ExtractedPage {
    pub header: Option<CandidateBlock>,
    pub footer: Option<CandidateBlock>,
    pub body: Vec<CandidateBlock>,
}

/// Run all heuristic extractors over one page's markup. Platform-agnostic:
/// this is the whole strategy for unknown platforms and the region finder for
/// known ones.
pub fn extract_page(markup: &str) -> ExtractedPage {
    let (header, header_span) = chrome::detect_header(markup);
    let (footer, footer_span) = chrome::detect_footer(markup);

    // Blank out chrome regions so body detectors never re-match them.
    let mut body = markup.to_string();
    for span in [&header_span, &footer_span].into_iter().flatten() {
        body.replace_range(span.clone(), &" ".repeat(span.len()));
    }

    let mut candidates = commerce::detect(&body);
    candidates.extend(sections::segment(&body, &candidates));

    let resolved = resolve_overlaps(candidates);
    ExtractedPage {
        header,
        footer,
        body: resolved.into_iter().map(|s| s.block).collect(),
    }
}

/// Keep the highest-confidence candidate wherever two overlap; equal
/// confidence resolves to the earliest in document order. Survivors come back
/// in document order.
pub fn resolve_overlaps(mut candidates: Vec<Spanned>) -> Vec<Spanned> {
    candidates.sort_by(|a, b| {
        b.block
            .confidence
            .partial_cmp(&a.block.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.start.cmp(&b.start))
    });

    let mut kept: Vec<Spanned> = Vec::new();
    for cand in candidates {
        let overlaps = kept
            .iter()
            .any(|k| cand.start < k.end && k.start < cand.end);
        if !overlaps {
            kept.push(cand);
        }
    }
    kept.sort_by_key(|s| s.start);
    kept
}

/// Strip tags and collapse whitespace. Good enough for heuristics; the
/// original markup is always preserved alongside.
pub fn strip_tags(markup: &str) -> String {
    let text = TAG_RE.replace_all(markup, " ");
    WS_RE.replace_all(&text, " ").trim().to_string()
}

/// First h1–h3 text in a fragment.
pub fn first_heading(markup: &str) -> Option<String> {
    HEADING_RE
        .captures(markup)
        .map(|c| strip_tags(&c[2]))
        .filter(|t| !t.is_empty())
}

/// Locate the region of the first `<tag ...> ... </tag>` pair, tolerating
/// nesting of the same tag. Byte range covers the whole element.
pub fn tag_region(markup: &str, tag: &str) -> Option<std::ops::Range<usize>> {
    let lower = markup.to_ascii_lowercase();
    let open_marker = format!("<{}", tag);
    let close_marker = format!("</{}>", tag);

    let start = find_open_tag(&lower, &open_marker)?;
    let mut depth = 0usize;
    let mut pos = start;

    while pos < lower.len() {
        let next_open = find_open_tag(&lower[pos..], &open_marker).map(|i| i + pos);
        let next_close = lower[pos..].find(&close_marker).map(|i| i + pos);
        match (next_open, next_close) {
            (Some(o), Some(c)) if o < c => {
                depth += 1;
                pos = o + open_marker.len();
            }
            (_, Some(c)) => {
                depth -= 1;
                if depth == 0 {
                    return Some(start..c + close_marker.len());
                }
                pos = c + close_marker.len();
            }
            _ => return None,
        }
    }
    None
}

// `<header` must not match `<headerline`; the next byte has to end the name.
fn find_open_tag(haystack: &str, marker: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(i) = haystack[offset..].find(marker) {
        let at = offset + i;
        match haystack.as_bytes().get(at + marker.len()) {
            Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'/') => return Some(at),
            None => return None,
            _ => offset = at + marker.len(),
        }
    }
    None
}
