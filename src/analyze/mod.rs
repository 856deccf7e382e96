//! Semantic classification of candidate blocks. Local keyword/structure rules
//! run first; fragments that stay ambiguous may be escalated to the external
//! content-understanding service, which is strictly best-effort: on timeout
//! or error the local result stands and the job continues.

pub mod remote;

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::schema::{BlockType, CandidateBlock};
use remote::RemoteClassifier;

/// Confidence tiers for the local rules.
pub const STRONG: f32 = 0.9;
pub const STRUCTURAL: f32 = 0.6;
pub const WEAK: f32 = 0.3;
/// Candidates below this are eligible for remote escalation.
pub const ESCALATION_CUTOFF: f32 = 0.75;

static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").unwrap());
static IMG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<img\s[^>]*src="([^"]*)""#).unwrap());
static CTA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<(?:a|button)[^>]*(?:class="[^"]*(?:btn|button|cta)[^"]*"|href="[^"]*")[^>]*>(.*?)</(?:a|button)>"#)
        .unwrap()
});
// Curly quotes only outside blockquote: straight quotes would match html
// attribute values.
static QUOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<blockquote[^>]*>(.*?)</blockquote>|“([^”]{20,300})”").unwrap()
});
static AUTHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)[—–-]\s*([A-Z][A-Za-z .]{2,40})\s*$").unwrap());
static FORM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<form\b|<input\b|<textarea\b").unwrap());
static SUBMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<(?:button|input)[^>]*type="submit"[^>]*(?:value="([^"]*)")?"#).unwrap()
});

/// What the analyzer concluded about one candidate. `fallback_used` is set
/// when the remote path was attempted and degraded to the local result.
#[derive(Debug)]
pub struct Analysis {
    pub block: CandidateBlock,
    pub fallback_used: bool,
}

/// Classify one candidate. Already-confident candidates pass through; the
/// analyzer never invents a type outside the registry, so an unclassifiable
/// fragment keeps `kind = None`.
pub async fn analyze(
    mut candidate: CandidateBlock,
    remote: Option<&RemoteClassifier>,
) -> Analysis {
    if candidate.kind.is_some() && candidate.confidence >= ESCALATION_CUTOFF {
        return Analysis {
            block: candidate,
            fallback_used: false,
        };
    }

    let local = classify_local(&candidate);
    if let Some((kind, confidence, props)) = &local {
        if *confidence >= ESCALATION_CUTOFF {
            apply(&mut candidate, *kind, *confidence, props);
            return Analysis {
                block: candidate,
                fallback_used: false,
            };
        }
    }

    // Ambiguous: ask the external classifier, bounded; degrade to the local
    // result on any failure.
    if let Some(remote) = remote {
        let text = candidate
            .properties
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match remote.classify(&text).await {
            Ok((label, confidence)) => {
                if let Some(kind) = BlockType::from_name(&label) {
                    apply(&mut candidate, kind, confidence, &[]);
                    return Analysis {
                        block: candidate,
                        fallback_used: false,
                    };
                }
                debug!("remote classifier returned unknown label {:?}", label);
            }
            Err(e) => {
                debug!("remote classification degraded: {}", e);
                apply_local(&mut candidate, &local);
                return Analysis {
                    block: candidate,
                    fallback_used: true,
                };
            }
        }
    }

    apply_local(&mut candidate, &local);
    Analysis {
        block: candidate,
        fallback_used: false,
    }
}

type LocalResult = Option<(BlockType, f32, Vec<(String, Value)>)>;

fn apply_local(candidate: &mut CandidateBlock, local: &LocalResult) {
    if let Some((kind, confidence, props)) = local {
        apply(candidate, *kind, *confidence, props);
    }
}

fn apply(candidate: &mut CandidateBlock, kind: BlockType, confidence: f32, props: &[(String, Value)]) {
    candidate.kind = Some(kind);
    candidate.confidence = confidence;
    for (k, v) in props {
        candidate.properties.entry(k.clone()).or_insert_with(|| v.clone());
    }
}

/// Rule-based classification over the fragment's markup and stripped text.
fn classify_local(candidate: &CandidateBlock) -> LocalResult {
    let html = candidate
        .properties
        .get("html")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let text = candidate
        .properties
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default();

    if html.is_empty() && text.is_empty() {
        return None;
    }

    // Form: input controls are unambiguous.
    if FORM_RE.is_match(html) {
        let submit = SUBMIT_RE
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "Submit".into());
        return Some((
            BlockType::Form,
            STRONG,
            vec![("submitText".into(), submit.into())],
        ));
    }

    // Testimonial: quotation plus an attribution cue.
    if let Some(caps) = QUOTE_RE.captures(html) {
        let quote = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| crate::extract::strip_tags(m.as_str()))
            .unwrap_or_default();
        if !quote.is_empty() {
            let author = AUTHOR_RE.captures(text).map(|c| c[1].trim().to_string());
            let confidence = if author.is_some() { STRONG } else { STRUCTURAL };
            let mut props = vec![("quote".to_string(), Value::from(quote))];
            if let Some(author) = author {
                props.push(("author".into(), author.into()));
            }
            return Some((BlockType::Testimonial, confidence, props));
        }
    }

    let images: Vec<String> = IMG_RE
        .captures_iter(html)
        .map(|c| c[1].to_string())
        .collect();

    // Gallery: repeated images with little text around them.
    if images.len() >= 3 {
        return Some((
            BlockType::Gallery,
            STRONG,
            vec![(
                "images".into(),
                Value::Array(images.into_iter().map(Value::from).collect()),
            )],
        ));
    }

    // Hero: top-level heading, stronger with a call to action.
    if let Some(caps) = H1_RE.captures(html) {
        let heading = crate::extract::strip_tags(&caps[1]);
        let cta = CTA_RE
            .captures(html)
            .map(|c| crate::extract::strip_tags(&c[1]))
            .filter(|t| !t.is_empty() && t.len() < 40);
        let confidence = if cta.is_some() { STRONG } else { STRUCTURAL };
        let mut props = vec![("heading".to_string(), Value::from(heading))];
        if let Some(cta) = cta {
            props.push(("ctaText".into(), cta.into()));
        }
        if let Some(img) = images.first() {
            props.push(("imageUrl".into(), img.clone().into()));
        }
        return Some((BlockType::Hero, confidence, props));
    }

    // Single image with a caption-sized amount of text.
    if images.len() == 1 && text.len() < 120 {
        return Some((
            BlockType::Image,
            STRUCTURAL,
            vec![("src".into(), images[0].clone().into())],
        ));
    }

    // Plain prose.
    if text.len() >= 40 {
        return Some((
            BlockType::Text,
            STRUCTURAL,
            vec![("text".into(), text.to_string().into())],
        ));
    }
    if !text.is_empty() {
        return Some((BlockType::Text, WEAK, vec![("text".into(), text.to_string().into())]));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(html: &str) -> CandidateBlock {
        CandidateBlock::new(None, 0.2)
            .with_prop("html", html.to_string())
            .with_prop("text", crate::extract::strip_tags(html))
    }

    async fn classify(html: &str) -> CandidateBlock {
        analyze(candidate(html), None).await.block
    }

    #[tokio::test]
    async fn hero_with_cta_is_strong() {
        let block = classify(
            r#"<section><h1>Summer Sale</h1><p>Up to 50% off</p><a class="btn" href="/shop">Shop now</a></section>"#,
        )
        .await;
        assert_eq!(block.kind, Some(BlockType::Hero));
        assert!(block.confidence >= STRONG);
        assert_eq!(block.properties["heading"], "Summer Sale");
        assert_eq!(block.properties["ctaText"], "Shop now");
    }

    #[tokio::test]
    async fn gallery_from_repeated_images() {
        let block = classify(
            r#"<div><img src="/a.jpg"><img src="/b.jpg"><img src="/c.jpg"></div>"#,
        )
        .await;
        assert_eq!(block.kind, Some(BlockType::Gallery));
        assert_eq!(block.properties["images"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn testimonial_with_author() {
        let block = classify(
            "<blockquote>The best shop I have ever ordered from, truly.</blockquote><p>— Jane Doe</p>",
        )
        .await;
        assert_eq!(block.kind, Some(BlockType::Testimonial));
        assert_eq!(block.properties["author"], "Jane Doe");
    }

    #[tokio::test]
    async fn form_detected() {
        let block = classify(
            r#"<form><input name="email"><button type="submit">Join</button></form>"#,
        )
        .await;
        assert_eq!(block.kind, Some(BlockType::Form));
    }

    #[tokio::test]
    async fn prose_is_text() {
        let block = classify(
            "<p>We started this store in a garage and still pack every order by hand.</p>",
        )
        .await;
        assert_eq!(block.kind, Some(BlockType::Text));
        assert_eq!(block.confidence, STRUCTURAL);
    }

    #[tokio::test]
    async fn empty_fragment_stays_unknown() {
        let block = analyze(CandidateBlock::new(None, 0.2), None).await.block;
        assert_eq!(block.kind, None);
    }

    #[tokio::test]
    async fn failing_remote_degrades_to_local_result() {
        // Ambiguous fragment (short prose, weak local confidence) forces the
        // escalation path; the unreachable service must not lose the local
        // classification or fail the fragment.
        let remote = RemoteClassifier::new("http://192.0.2.1:9/classify".into(), None);
        let analysis = analyze(candidate("<p>Short note.</p>"), Some(&remote)).await;
        assert!(analysis.fallback_used);
        assert_eq!(analysis.block.kind, Some(BlockType::Text));
        assert_eq!(analysis.block.confidence, WEAK);
    }

    #[tokio::test]
    async fn confident_candidates_pass_through() {
        let input = CandidateBlock::new(Some(BlockType::ProductGrid), 0.85);
        let analysis = analyze(input, None).await;
        assert_eq!(analysis.block.kind, Some(BlockType::ProductGrid));
        assert!(!analysis.fallback_used);
    }
}
