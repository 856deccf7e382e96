//! Wix adapter. Wix exports are page crawls rather than API listings, so the
//! platform knowledge here is thin: page titles from the document head and
//! assets on the wixstatic CDN. Region detection happens downstream in the
//! shared extractors.

use std::sync::LazyLock;

use regex::Regex;

use super::{slug_from_name, ExtractResult, PlatformAdapter, RawEntity};
use crate::bundle::SourceBundle;
use crate::detect::Platform;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static WIXSTATIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://static\.wixstatic\.com/[^"'\s)]+"#).unwrap());

pub struct WixAdapter;

impl PlatformAdapter for WixAdapter {
    fn platform(&self) -> Option<Platform> {
        Some(Platform::Wix)
    }

    fn extract(&self, bundle: &SourceBundle) -> ExtractResult {
        let mut out = Vec::new();
        for doc in bundle.html_docs() {
            let mut entity = RawEntity::page(doc.name.clone(), doc.content.clone())
                .with_attr("slug", slug_from_name(&doc.name));
            if let Some(caps) = TITLE_RE.captures(&doc.content) {
                let title = crate::extract::strip_tags(&caps[1]);
                if !title.is_empty() {
                    entity = entity.with_attr("title", title);
                }
            }
            out.push(Ok(entity));

            for m in WIXSTATIC_RE.find_iter(&doc.content) {
                out.push(Ok(RawEntity::asset(m.as_str(), &doc.name)));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::EntityKind;
    use crate::bundle::{DocKind, SourceDoc};
    use std::path::PathBuf;

    #[test]
    fn pages_and_assets() {
        let html = r#"<html><head><title>My Wix Store</title></head>
            <body><img src="https://static.wixstatic.com/media/a.png"></body></html>"#;
        let bundle = SourceBundle {
            root: PathBuf::from("test"),
            docs: vec![SourceDoc {
                name: "index.html".into(),
                kind: DocKind::Html,
                content: html.into(),
            }],
            hint: None,
        };
        let entities = WixAdapter.extract(&bundle);
        let ok: Vec<&RawEntity> = entities.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(ok.len(), 2);
        assert_eq!(ok[0].attr("title"), Some("My Wix Store"));
        assert_eq!(ok[1].kind, EntityKind::Asset);
    }
}
