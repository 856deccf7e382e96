use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::bundle::SourceBundle;

/// Platforms the pipeline has a dedicated adapter for. Ordering is the
/// detection tie-break priority: most widely deployed first, so an ambiguous
/// bundle lands on the adapter least likely to be wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Platform {
    Shopify,
    WooCommerce,
    Wix,
}

impl Platform {
    pub const ALL: &'static [Platform] =
        &[Platform::Shopify, Platform::WooCommerce, Platform::Wix];

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Shopify => "shopify",
            Platform::WooCommerce => "woocommerce",
            Platform::Wix => "wix",
        }
    }

    pub fn from_name(name: &str) -> Option<Platform> {
        Platform::ALL
            .iter()
            .copied()
            .find(|p| p.name() == name.to_ascii_lowercase())
    }

    /// Lower is higher priority.
    fn priority(&self) -> usize {
        Platform::ALL.iter().position(|p| p == self).unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub platform: Option<Platform>,
    pub confidence: f32,
    /// Every rule evaluated for the winning platform (or all platforms when
    /// nothing won), in declaration order.
    pub signals: Vec<(String, bool)>,
}

/// A platform is chosen when at least half its signature rules match and at
/// least this many signals fired.
const MIN_CONFIDENCE: f32 = 0.5;
const MIN_SIGNALS: usize = 2;

macro_rules! sig {
    ($static_name:ident, $re:expr) => {
        static $static_name: LazyLock<Regex> = LazyLock::new(|| Regex::new($re).unwrap());
    };
}

sig!(SHOPIFY_CDN, r"cdn\.shopify\.com|cdn\.shopifycdn\.net");
sig!(SHOPIFY_THEME, r"Shopify\.theme|window\.Shopify");
sig!(SHOPIFY_COLLECTIONS, r#"href="[^"]*/collections/"#);
sig!(SHOPIFY_SECTION, r#"id="shopify-section-"#);
sig!(WOO_PLUGIN, r"wp-content/plugins/woocommerce");
sig!(WOO_BODY_CLASS, r#"class="[^"]*woocommerce[^"]*""#);
sig!(WOO_WPJSON, r"/wp-json/wc/");
sig!(WOO_GENERATOR, r#"name="generator"\s+content="WooCommerce"#);
sig!(WIX_STATIC, r"static\.wixstatic\.com");
sig!(WIX_WARMUP, r"wix-warmup-data|wixBiSession");
sig!(WIX_META, r#"content="Wix\.com"#);
sig!(WIX_COMP, r#"data-comp-id="#);

fn rule_set(platform: Platform) -> Vec<(&'static str, &'static Regex)> {
    match platform {
        Platform::Shopify => vec![
            ("shopify-cdn-asset", &*SHOPIFY_CDN),
            ("shopify-theme-global", &*SHOPIFY_THEME),
            ("shopify-collections-url", &*SHOPIFY_COLLECTIONS),
            ("shopify-section-id", &*SHOPIFY_SECTION),
        ],
        Platform::WooCommerce => vec![
            ("woo-plugin-path", &*WOO_PLUGIN),
            ("woo-body-class", &*WOO_BODY_CLASS),
            ("woo-rest-api", &*WOO_WPJSON),
            ("woo-generator-meta", &*WOO_GENERATOR),
        ],
        Platform::Wix => vec![
            ("wix-static-asset", &*WIX_STATIC),
            ("wix-warmup-marker", &*WIX_WARMUP),
            ("wix-generator-meta", &*WIX_META),
            ("wix-comp-id", &*WIX_COMP),
        ],
    }
}

/// Classify a bundle. Never fails: an unrecognized bundle yields
/// `platform: None` with confidence 0 and the full signal trace.
pub fn detect(bundle: &SourceBundle) -> DetectionResult {
    // A declared hint short-circuits signature scanning.
    if let Some(platform) = bundle.hint {
        return DetectionResult {
            platform: Some(platform),
            confidence: 1.0,
            signals: vec![("manifest-platform-hint".to_string(), true)],
        };
    }

    let mut best: Option<(Platform, usize, Vec<(String, bool)>)> = None;
    let mut all_signals = Vec::new();

    for &platform in Platform::ALL {
        let rules = rule_set(platform);
        let signals: Vec<(String, bool)> = rules
            .iter()
            .map(|(name, pattern)| {
                let matched = bundle.all_text().any(|text| pattern.is_match(text));
                (name.to_string(), matched)
            })
            .collect();
        let matched = signals.iter().filter(|(_, m)| *m).count();
        debug!("{}: {}/{} signals", platform.name(), matched, rules.len());
        all_signals.extend(signals.iter().cloned());

        let confident =
            matched >= MIN_SIGNALS && matched as f32 / rules.len() as f32 >= MIN_CONFIDENCE;
        if !confident {
            continue;
        }

        // Tie-break: more matched signals wins; equal counts resolve by the
        // fixed priority order in Platform::ALL.
        let better = match &best {
            None => true,
            Some((current, count, _)) => {
                matched > *count
                    || (matched == *count && platform.priority() < current.priority())
            }
        };
        if better {
            best = Some((platform, matched, signals));
        }
    }

    match best {
        Some((platform, matched, signals)) => DetectionResult {
            platform: Some(platform),
            confidence: matched as f32 / signals.len() as f32,
            signals,
        },
        None => DetectionResult {
            platform: None,
            confidence: 0.0,
            signals: all_signals,
        },
    }
}
