pub mod generic;
pub mod shopify;
pub mod wix;
pub mod woocommerce;

use std::collections::BTreeMap;

use crate::bundle::SourceBundle;
use crate::detect::{DetectionResult, Platform};
use crate::error::ImportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Page,
    Section,
    Asset,
}

/// Adapter output before semantic normalization: one page, shared section, or
/// asset reference pulled from the bundle. Job-scoped scratch state; ordering
/// and `BTreeMap` attributes keep extraction deterministic.
#[derive(Debug, Clone)]
pub struct RawEntity {
    pub kind: EntityKind,
    pub source_id: String,
    pub attributes: BTreeMap<String, String>,
    pub raw_markup: Option<String>,
}

impl RawEntity {
    pub fn page(source_id: impl Into<String>, markup: impl Into<String>) -> Self {
        RawEntity {
            kind: EntityKind::Page,
            source_id: source_id.into(),
            attributes: BTreeMap::new(),
            raw_markup: Some(markup.into()),
        }
    }

    pub fn asset(url: impl Into<String>, origin: &str) -> Self {
        let url = url.into();
        let mut attributes = BTreeMap::new();
        attributes.insert("url".to_string(), url.clone());
        attributes.insert("origin".to_string(), origin.to_string());
        RawEntity {
            kind: EntityKind::Asset,
            source_id: url,
            attributes,
            raw_markup: None,
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// One extraction attempt per entity: a broken page becomes an error element,
/// never an aborted job.
pub type ExtractResult = Vec<Result<RawEntity, ImportError>>;

/// Platform-specific translator from bundle structure to raw entities.
/// Implementations must be deterministic: the same bundle always yields the
/// same entity sequence.
pub trait PlatformAdapter: Send + Sync {
    /// None for the generic fallback.
    fn platform(&self) -> Option<Platform>;

    fn applies(&self, detection: &DetectionResult) -> bool {
        self.platform() == detection.platform
    }

    fn extract(&self, bundle: &SourceBundle) -> ExtractResult;
}

/// Pick the adapter for a detection result; unknown platforms fall back to
/// the generic adapter.
pub fn select_adapter(detection: &DetectionResult) -> Box<dyn PlatformAdapter> {
    let dedicated: Vec<Box<dyn PlatformAdapter>> = vec![
        Box::new(shopify::ShopifyAdapter),
        Box::new(woocommerce::WooCommerceAdapter),
        Box::new(wix::WixAdapter),
    ];
    dedicated
        .into_iter()
        .find(|adapter| adapter.applies(detection))
        .unwrap_or_else(|| Box::new(generic::GenericAdapter))
}

/// Derive a slug from a document name: `about-us.html` → `about-us`.
pub(crate) fn slug_from_name(name: &str) -> String {
    let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
    stem.to_ascii_lowercase().replace([' ', '_'], "-")
}
