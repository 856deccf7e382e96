//! Block postprocessing: the gate between loosely-shaped candidates and the
//! canonical schema. Required properties are defaulted, stringified values
//! coerced, unknown properties dropped (reported, not fatal), and anything
//! unclassifiable is preserved as a `raw` block rather than discarded.

use serde_json::Value;

use crate::detect::Platform;
use crate::report::{Issue, Stage};
use crate::schema::{type_schema, Block, BlockType, CandidateBlock};

pub struct Normalized {
    pub block: Block,
    pub issues: Vec<Issue>,
}

/// Normalize one candidate tree into a canonical block tree. Ids are assigned
/// depth-first from `counter` so re-imports of the same bundle produce
/// identical structure.
pub fn normalize_tree(
    candidate: CandidateBlock,
    platform: Option<Platform>,
    slug: &str,
    counter: &mut usize,
) -> Normalized {
    let mut issues = Vec::new();
    let block = normalize_one(candidate, platform, slug, counter, &mut issues);
    Normalized { block, issues }
}

fn normalize_one(
    mut candidate: CandidateBlock,
    platform: Option<Platform>,
    slug: &str,
    counter: &mut usize,
    issues: &mut Vec<Issue>,
) -> Block {
    apply_platform_aliases(&mut candidate, platform);

    let id = format!("{}-b{}", slug, *counter);
    *counter += 1;

    let Some(kind) = candidate.kind else {
        // Preserving user content beats schema purity: unknown fragments
        // become raw blocks carrying their original markup.
        let markup = candidate
            .properties
            .remove("html")
            .or_else(|| candidate.properties.remove("text"))
            .unwrap_or_else(|| Value::from(""));
        issues.push(
            Issue::new(Stage::Normalizing, "unclassified fragment kept as raw block")
                .with_detail(id.clone()),
        );
        return Block {
            id,
            kind: BlockType::Raw,
            properties: [("html".to_string(), markup)].into_iter().collect(),
            children: vec![],
        };
    };

    let schema = type_schema(kind);
    let mut properties = std::collections::BTreeMap::new();

    for (key, value) in std::mem::take(&mut candidate.properties) {
        let required = schema.required.iter().any(|(n, _)| *n == key);
        let optional = schema.optional.contains(&key.as_str());
        if !required && !optional {
            // "html"/"text" are pipeline carriers, not authored properties;
            // dropping them is not worth an issue.
            if key != "html" && key != "text" {
                issues.push(
                    Issue::new(
                        Stage::Normalizing,
                        format!("dropped property not in {} schema", kind.name()),
                    )
                    .with_detail(format!("{}: {}", id, key)),
                );
            }
            continue;
        }
        let value = if schema.numeric.contains(&key.as_str()) {
            coerce_numeric(value, &key, &id, issues)
        } else {
            value
        };
        properties.insert(key, value);
    }

    for (name, default) in schema.required {
        if !properties.contains_key(*name) {
            properties.insert(name.to_string(), default_value(default));
            issues.push(
                Issue::new(
                    Stage::Normalizing,
                    format!("missing required {} property defaulted", kind.name()),
                )
                .with_detail(format!("{}: {}", id, name)),
            );
        }
    }

    let children = std::mem::take(&mut candidate.children)
        .into_iter()
        .map(|child| normalize_one(child, platform, slug, counter, issues))
        .collect();

    Block {
        id,
        kind,
        properties,
        children,
    }
}

/// Stringified numbers are a fact of life in exports; parse them in place.
fn coerce_numeric(value: Value, key: &str, id: &str, issues: &mut Vec<Issue>) -> Value {
    match &value {
        Value::Number(_) => value,
        Value::String(s) => {
            let cleaned = normalize_decimal(s.trim());
            if let Ok(n) = cleaned.parse::<i64>() {
                return Value::from(n);
            }
            if let Ok(f) = cleaned.parse::<f64>() {
                return Value::from(f);
            }
            issues.push(
                Issue::new(Stage::Normalizing, "non-numeric value replaced with 0")
                    .with_detail(format!("{}: {} = {:?}", id, key, s)),
            );
            Value::from(0)
        }
        _ => {
            issues.push(
                Issue::new(Stage::Normalizing, "non-numeric value replaced with 0")
                    .with_detail(format!("{}: {}", id, key)),
            );
            Value::from(0)
        }
    }
}

/// A comma is a decimal separator only in "12,50"-style values; otherwise it
/// is thousands grouping ("1,200") and is stripped.
fn normalize_decimal(s: &str) -> String {
    match s.rsplit_once(',') {
        Some((int, frac))
            if !frac.is_empty()
                && frac.len() <= 2
                && frac.chars().all(|c| c.is_ascii_digit())
                && !int.contains(',') =>
        {
            format!("{}.{}", int, frac)
        }
        _ => s.replace(',', ""),
    }
}

fn default_value(default: &str) -> Value {
    if default == "[]" {
        return Value::Array(vec![]);
    }
    if let Ok(n) = default.parse::<i64>() {
        return Value::from(n);
    }
    Value::from(default)
}

/// Legacy property names that individual platforms emit in volume enough to
/// deserve their own mapping stage.
fn apply_platform_aliases(candidate: &mut CandidateBlock, platform: Option<Platform>) {
    let aliases: &[(&str, &str)] = match platform {
        Some(Platform::Shopify) => &[
            ("img_url", "src"),
            ("image", "imageUrl"),
            ("cta", "ctaText"),
            ("cta_link", "ctaUrl"),
        ],
        Some(Platform::WooCommerce) => &[
            ("attachment_url", "src"),
            ("regular_price", "price"),
            ("short_description", "text"),
        ],
        _ => &[],
    };
    for (from, to) in aliases {
        if let Some(value) = candidate.properties.remove(*from) {
            candidate.properties.entry(to.to_string()).or_insert(value);
        }
    }
    for child in &mut candidate.children {
        apply_platform_aliases(child, platform);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_required_props() {
        let candidate = CandidateBlock::new(Some(BlockType::Product), 0.8);
        let mut counter = 0;
        let n = normalize_tree(candidate, None, "home", &mut counter);
        assert!(n.block.satisfies_schema());
        assert_eq!(n.block.properties["title"], "");
        assert_eq!(n.block.properties["price"], 0);
        assert_eq!(n.issues.len(), 2);
    }

    #[test]
    fn stringified_numbers_coerced() {
        let candidate = CandidateBlock::new(Some(BlockType::Product), 0.8)
            .with_prop("title", "Mug")
            .with_prop("price", "12,50");
        let mut counter = 0;
        let n = normalize_tree(candidate, None, "shop", &mut counter);
        assert_eq!(n.block.properties["price"], 12.5);
        assert!(n.issues.is_empty());
    }

    #[test]
    fn thousands_grouping_is_not_a_decimal() {
        let candidate = CandidateBlock::new(Some(BlockType::Product), 0.8)
            .with_prop("title", "Sofa")
            .with_prop("price", "1,200");
        let mut counter = 0;
        let n = normalize_tree(candidate, None, "shop", &mut counter);
        assert_eq!(n.block.properties["price"], 1200);
        assert!(n.issues.is_empty());

        let candidate = CandidateBlock::new(Some(BlockType::Product), 0.8)
            .with_prop("title", "Sofa")
            .with_prop("price", "1,200.50");
        let mut counter = 0;
        let n = normalize_tree(candidate, None, "shop", &mut counter);
        assert_eq!(n.block.properties["price"], 1200.5);
    }

    #[test]
    fn unknown_props_dropped_with_issue() {
        let candidate = CandidateBlock::new(Some(BlockType::Text), 0.6)
            .with_prop("text", "hello there")
            .with_prop("bgColor", "#fff");
        let mut counter = 0;
        let n = normalize_tree(candidate, None, "home", &mut counter);
        assert!(!n.block.properties.contains_key("bgColor"));
        assert_eq!(n.issues.len(), 1);
        assert!(n.issues[0].detail.as_ref().unwrap().contains("bgColor"));
    }

    #[test]
    fn unclassified_becomes_raw_not_dropped() {
        let candidate =
            CandidateBlock::new(None, 0.2).with_prop("html", "<marquee>old content</marquee>");
        let mut counter = 0;
        let n = normalize_tree(candidate, None, "home", &mut counter);
        assert_eq!(n.block.kind, BlockType::Raw);
        assert_eq!(n.block.properties["html"], "<marquee>old content</marquee>");
    }

    #[test]
    fn ids_are_deterministic_depth_first() {
        let make = || {
            let mut parent = CandidateBlock::new(Some(BlockType::ProductGrid), 0.85);
            parent.children = vec![
                CandidateBlock::new(Some(BlockType::Product), 0.8).with_prop("title", "A"),
                CandidateBlock::new(Some(BlockType::Product), 0.8).with_prop("title", "B"),
            ];
            parent
        };
        let mut c1 = 0;
        let mut c2 = 0;
        let first = normalize_tree(make(), None, "home", &mut c1).block;
        let second = normalize_tree(make(), None, "home", &mut c2).block;
        assert_eq!(first, second);
        assert_eq!(first.id, "home-b0");
        assert_eq!(first.children[0].id, "home-b1");
        assert_eq!(first.children[1].id, "home-b2");
    }

    #[test]
    fn shopify_aliases_mapped() {
        let candidate = CandidateBlock::new(Some(BlockType::Image), 0.6)
            .with_prop("img_url", "/a.png");
        let mut counter = 0;
        let n = normalize_tree(candidate, Some(Platform::Shopify), "home", &mut counter);
        assert_eq!(n.block.properties["src"], "/a.png");
    }
}
