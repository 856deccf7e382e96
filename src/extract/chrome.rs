//! Header/footer detection by structural signature: the semantic tags when
//! present, otherwise a navigation cluster near the top or a copyright
//! cluster near the bottom of the document.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use super::{strip_tags, tag_region};
use crate::schema::{BlockType, CandidateBlock};

static NAV_LINKS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)<a\s[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#).unwrap());
static LOGO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\s[^>]*src="([^"]*(?:logo|brand)[^"]*)""#).unwrap()
});
static COPYRIGHT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(©|&copy;|copyright)\s*[^<]{0,80}").unwrap());

/// How far into the document a nav cluster may start and still count as the
/// page header (fraction of total length).
const TOP_REGION: f32 = 0.35;
const BOTTOM_REGION: f32 = 0.6;

pub fn detect_header(markup: &str) -> (Option<CandidateBlock>, Option<Range<usize>>) {
    if let Some(region) = tag_region(markup, "header") {
        let block = header_block(&markup[region.clone()], 0.95);
        return (Some(block), Some(region));
    }

    // No <header> tag: a <nav> in the top region of the document is the next
    // best structural signal.
    if let Some(region) = tag_region(markup, "nav") {
        let cutoff = (markup.len() as f32 * TOP_REGION) as usize;
        if region.start <= cutoff {
            let block = header_block(&markup[region.clone()], 0.7);
            return (Some(block), Some(region));
        }
    }
    (None, None)
}

pub fn detect_footer(markup: &str) -> (Option<CandidateBlock>, Option<Range<usize>>) {
    if let Some(region) = tag_region(markup, "footer") {
        let block = footer_block(&markup[region.clone()], 0.95);
        return (Some(block), Some(region));
    }

    // Fallback: a copyright line in the bottom region.
    if let Some(m) = COPYRIGHT_RE.find(markup) {
        let cutoff = (markup.len() as f32 * BOTTOM_REGION) as usize;
        if m.start() >= cutoff {
            let block = footer_block(m.as_str(), 0.6);
            return (Some(block), Some(m.range()));
        }
    }
    (None, None)
}

fn header_block(markup: &str, confidence: f32) -> CandidateBlock {
    let links = collect_links(markup);
    let title = links
        .first()
        .map(|(_, text)| text.clone())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| strip_tags(markup).split(' ').take(4).collect::<Vec<_>>().join(" "));

    let mut block = CandidateBlock::new(Some(BlockType::Header), confidence)
        .with_prop("title", title)
        .with_prop(
            "links",
            serde_json::Value::Array(
                links
                    .iter()
                    .map(|(href, text)| serde_json::json!({ "url": href, "text": text }))
                    .collect(),
            ),
        );
    if let Some(caps) = LOGO_RE.captures(markup) {
        block = block.with_prop("logoUrl", caps[1].to_string());
    }
    block
}

fn footer_block(markup: &str, confidence: f32) -> CandidateBlock {
    let mut block = CandidateBlock::new(Some(BlockType::Footer), confidence)
        .with_prop("text", strip_tags(markup));
    if let Some(m) = COPYRIGHT_RE.find(markup) {
        block = block.with_prop("copyright", strip_tags(m.as_str()));
    }
    let links = collect_links(markup);
    if !links.is_empty() {
        block = block.with_prop(
            "links",
            serde_json::Value::Array(
                links
                    .iter()
                    .map(|(href, text)| serde_json::json!({ "url": href, "text": text }))
                    .collect(),
            ),
        );
    }
    block
}

fn collect_links(markup: &str) -> Vec<(String, String)> {
    NAV_LINKS_RE
        .captures_iter(markup)
        .map(|c| (c[1].to_string(), strip_tags(&c[2])))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_tag_detected() {
        let html = r#"<html><header><a href="/">Acme Shop</a><a href="/about">About</a></header><p>body</p></html>"#;
        let (block, span) = detect_header(html);
        let block = block.unwrap();
        assert_eq!(block.kind, Some(BlockType::Header));
        assert!(block.confidence > 0.9);
        assert_eq!(block.properties["title"], "Acme Shop");
        assert!(span.is_some());
    }

    #[test]
    fn top_nav_is_header_fallback() {
        let html = r#"<html><nav><a href="/">Home</a></nav><p>lots of body text follows here to push proportions</p></html>"#;
        let (block, _) = detect_header(html);
        let block = block.unwrap();
        assert_eq!(block.kind, Some(BlockType::Header));
        assert!(block.confidence < 0.9);
    }

    #[test]
    fn bottom_nav_is_not_header() {
        let html = format!(
            "<html><p>{}</p><nav><a href=\"/\">Home</a></nav></html>",
            "body ".repeat(200)
        );
        let (block, _) = detect_header(&html);
        assert!(block.is_none());
    }

    #[test]
    fn footer_with_copyright() {
        let html = r#"<html><p>body</p><footer>© 2024 Acme Inc</footer></html>"#;
        let (block, _) = detect_footer(html);
        let block = block.unwrap();
        assert_eq!(block.kind, Some(BlockType::Footer));
        assert!(block.properties.contains_key("copyright"));
    }

    #[test]
    fn no_chrome_in_plain_fragment() {
        let html = "<div><p>just a paragraph</p></div>";
        assert!(detect_header(html).0.is_none());
        assert!(detect_footer(html).0.is_none());
    }
}
