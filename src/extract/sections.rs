//! Generic fallback segmentation: whatever the chrome and commerce detectors
//! left uncovered is split into section-sized fragments for the analyzer.

use std::sync::LazyLock;

use regex::Regex;

use super::{strip_tags, Spanned};
use crate::schema::CandidateBlock;

static BOUNDARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<section\b|<article\b|<h1\b|<h2\b").unwrap());

/// Fragments shorter than this (stripped text) are noise, not sections.
const MIN_TEXT_LEN: usize = 12;

/// Segment the regions of `body` not already claimed by `occupied` into
/// unclassified candidates. Confidence is deliberately low so any real
/// detector wins an overlap.
pub fn segment(body: &str, occupied: &[Spanned]) -> Vec<Spanned> {
    let mut out = Vec::new();
    for gap in free_ranges(body.len(), occupied) {
        let region = &body[gap.clone()];
        for (start, end) in split_region(region) {
            let fragment = &region[start..end];
            let text = strip_tags(fragment);
            if text.len() < MIN_TEXT_LEN {
                continue;
            }
            let block = CandidateBlock::new(None, 0.2)
                .with_prop("html", fragment.trim().to_string())
                .with_prop("text", text);
            out.push(Spanned {
                start: gap.start + start,
                end: gap.start + end,
                block,
            });
        }
    }
    out
}

fn free_ranges(len: usize, occupied: &[Spanned]) -> Vec<std::ops::Range<usize>> {
    let mut spans: Vec<(usize, usize)> = occupied.iter().map(|s| (s.start, s.end)).collect();
    spans.sort_unstable();

    let mut ranges = Vec::new();
    let mut cursor = 0;
    for (start, end) in spans {
        if start > cursor {
            ranges.push(cursor..start);
        }
        cursor = cursor.max(end);
    }
    if cursor < len {
        ranges.push(cursor..len);
    }
    ranges
}

/// Split one region at section-ish boundaries. Always yields at least the
/// whole region when no boundary is found.
fn split_region(region: &str) -> Vec<(usize, usize)> {
    let mut cuts: Vec<usize> = BOUNDARY_RE
        .find_iter(region)
        .map(|m| m.start())
        .filter(|&p| p > 0)
        .collect();
    cuts.dedup();

    let mut parts = Vec::new();
    let mut prev = 0;
    for cut in cuts {
        parts.push((prev, cut));
        prev = cut;
    }
    parts.push((prev, region.len()));
    parts
}
