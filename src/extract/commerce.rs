//! Commerce region detection: product grids, single products, and loose
//! price/CTA clusters, found by repeated card structure plus currency-token
//! cues rather than any platform's conventions.

use std::sync::LazyLock;

use regex::Regex;

use super::{first_heading, strip_tags, Spanned};
use crate::schema::{BlockType, CandidateBlock};

static CARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<(?:div|li|article)\s[^>]*class="[^"]*(?:product|card|item)[^"]*""#)
        .unwrap()
});
static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:([$€£])\s?(\d+(?:[.,]\d{1,2})?))|(?:(\d+(?:[.,]\d{1,2})?)\s?(USD|EUR|GBP))")
        .unwrap()
});
static CTA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)add to (?:cart|bag|basket)|buy now|shop now|order now").unwrap()
});

/// Minimum repeated cards for a grid; fewer cards with commerce cues are
/// treated as individual products.
const GRID_MIN_CARDS: usize = 3;
const CLUSTER_WINDOW: usize = 400;

pub fn detect(body: &str) -> Vec<Spanned> {
    let card_starts: Vec<usize> = CARD_RE.find_iter(body).map(|m| m.start()).collect();

    let mut out = Vec::new();

    if card_starts.len() >= GRID_MIN_CARDS {
        let grid = grid_candidate(body, &card_starts);
        // Cards with no price anywhere are probably a blog/teaser list, not
        // commerce; leave them for the generic segmenter.
        if let Some(grid) = grid {
            out.push(grid);
            return out;
        }
    }

    // One or two cards: single-product candidates.
    for (i, &start) in card_starts.iter().enumerate() {
        let end = card_end(body, &card_starts, i);
        let card = &body[start..end];
        if PRICE_RE.is_match(card) {
            out.push(Spanned {
                start,
                end,
                block: product_candidate(card, 0.75),
            });
        }
    }

    // Loose price/CTA cluster outside any card: a CTA with a currency token
    // nearby is a buy box even without card markup.
    if out.is_empty() && card_starts.is_empty() {
        if let Some(m) = CTA_RE.find(body) {
            let lo = floor_char_boundary(body, m.start().saturating_sub(CLUSTER_WINDOW));
            let hi = floor_char_boundary(body, (m.end() + CLUSTER_WINDOW).min(body.len()));
            let window = &body[lo..hi];
            if PRICE_RE.is_match(window) {
                out.push(Spanned {
                    start: lo,
                    end: hi,
                    block: product_candidate(window, 0.6),
                });
            }
        }
    }

    out
}

fn grid_candidate(body: &str, card_starts: &[usize]) -> Option<Spanned> {
    let start = card_starts[0];
    let end = card_end(body, card_starts, card_starts.len() - 1);
    let region = &body[start..end];

    let price_count = PRICE_RE.find_iter(region).count();
    if price_count < 2 {
        return None;
    }

    let mut children = Vec::new();
    for (i, &cs) in card_starts.iter().enumerate() {
        let ce = card_end(body, card_starts, i);
        children.push(product_candidate(&body[cs..ce], 0.8));
    }

    let mut block = CandidateBlock::new(Some(BlockType::ProductGrid), 0.85)
        .with_prop("columns", 3);
    // Heading just above the grid, if any.
    let lookback = floor_char_boundary(body, start.saturating_sub(CLUSTER_WINDOW));
    if let Some(heading) = first_heading(&body[lookback..start]) {
        block = block.with_prop("heading", heading);
    }
    block.children = children;

    Some(Spanned { start, end, block })
}

fn product_candidate(card: &str, confidence: f32) -> CandidateBlock {
    let title = first_heading(card)
        .or_else(|| {
            strip_tags(card)
                .split(' ')
                .take(6)
                .collect::<Vec<_>>()
                .join(" ")
                .into()
        })
        .unwrap_or_default();

    let mut block =
        CandidateBlock::new(Some(BlockType::Product), confidence).with_prop("title", title);

    if let Some(caps) = PRICE_RE.captures(card) {
        let (raw, currency) = match (caps.get(1), caps.get(2), caps.get(3), caps.get(4)) {
            (Some(sym), Some(num), _, _) => (num.as_str(), symbol_code(sym.as_str())),
            (_, _, Some(num), Some(code)) => (num.as_str(), code.as_str()),
            _ => ("0", "USD"),
        };
        block = block
            .with_prop("price", raw.replace(',', "."))
            .with_prop("currency", currency);
    }
    if let Some(m) = CTA_RE.find(card) {
        block = block.with_prop("ctaText", m.as_str().to_string());
    }
    block
}

fn card_end(body: &str, card_starts: &[usize], idx: usize) -> usize {
    let end = card_starts
        .get(idx + 1)
        .copied()
        .unwrap_or_else(|| (card_starts[idx] + 1200).min(body.len()));
    floor_char_boundary(body, end)
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn symbol_code(symbol: &str) -> &'static str {
    match symbol {
        "€" => "EUR",
        "£" => "GBP",
        _ => "USD",
    }
}
