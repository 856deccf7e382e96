//! Kit unbundling: a theme "kit" is one JSON payload describing several
//! logical pages, optionally with shared header/footer markup. Expansion
//! yields one page entity per logical page; shared chrome is materialized
//! once as a Section entity and referenced by id, never duplicated.

use serde::Deserialize;
use tracing::debug;

use crate::adapters::{EntityKind, RawEntity};

pub const SHARED_HEADER_ATTR: &str = "shared_header_ref";
pub const SHARED_FOOTER_ATTR: &str = "shared_footer_ref";
pub const CHROME_KIND_ATTR: &str = "chrome_kind";

#[derive(Debug, Deserialize)]
struct KitDoc {
    kit: KitManifest,
}

#[derive(Debug, Deserialize)]
struct KitManifest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    shared: Option<SharedChrome>,
    pages: Vec<KitPage>,
}

#[derive(Debug, Deserialize)]
struct SharedChrome {
    #[serde(default)]
    header: Option<String>,
    #[serde(default)]
    footer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KitPage {
    slug: String,
    #[serde(default)]
    title: Option<String>,
    html: String,
}

/// Quick structural probe: does this JSON document look like a kit?
pub fn is_kit(content: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(content)
        .ok()
        .and_then(|v| v.get("kit").and_then(|k| k.get("pages")).cloned())
        .map(|pages| pages.is_array())
        .unwrap_or(false)
}

/// Expand a kit document into page entities plus shared-chrome section
/// entities. Returns None when the document isn't a parseable kit.
pub fn unbundle(doc_name: &str, content: &str) -> Option<Vec<RawEntity>> {
    let doc: KitDoc = serde_json::from_str(content).ok()?;
    let manifest = doc.kit;
    let kit_id = manifest
        .name
        .clone()
        .unwrap_or_else(|| crate::adapters::slug_from_name(doc_name));

    let mut entities = Vec::new();
    let mut header_ref = None;
    let mut footer_ref = None;

    if let Some(shared) = &manifest.shared {
        if let Some(markup) = &shared.header {
            let id = format!("{}-shared-header", kit_id);
            entities.push(shared_section(&id, "header", markup));
            header_ref = Some(id);
        }
        if let Some(markup) = &shared.footer {
            let id = format!("{}-shared-footer", kit_id);
            entities.push(shared_section(&id, "footer", markup));
            footer_ref = Some(id);
        }
    }

    for page in &manifest.pages {
        let mut entity = RawEntity::page(format!("{}/{}", kit_id, page.slug), page.html.clone())
            .with_attr("slug", page.slug.clone())
            .with_attr("title", page.title.clone().unwrap_or_else(|| page.slug.clone()));
        if let Some(id) = &header_ref {
            entity = entity.with_attr(SHARED_HEADER_ATTR, id.clone());
        }
        if let Some(id) = &footer_ref {
            entity = entity.with_attr(SHARED_FOOTER_ATTR, id.clone());
        }
        entities.push(entity);
    }

    debug!(
        "unbundled kit {}: {} pages, shared header={}, footer={}",
        kit_id,
        manifest.pages.len(),
        header_ref.is_some(),
        footer_ref.is_some()
    );
    Some(entities)
}

fn shared_section(id: &str, kind: &str, markup: &str) -> RawEntity {
    RawEntity {
        kind: EntityKind::Section,
        source_id: id.to_string(),
        attributes: std::collections::BTreeMap::new(),
        raw_markup: Some(markup.to_string()),
    }
    .with_attr(CHROME_KIND_ATTR, kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIT: &str = r#"{
        "kit": {
            "name": "spring-theme",
            "shared": {
                "header": "<header><a href=\"/\">Spring Shop</a></header>",
                "footer": "<footer>© Spring</footer>"
            },
            "pages": [
                { "slug": "home", "title": "Home", "html": "<h1>Welcome</h1>" },
                { "slug": "about", "html": "<h1>About</h1>" },
                { "slug": "contact", "title": "Contact", "html": "<h1>Contact</h1>" }
            ]
        }
    }"#;

    #[test]
    fn probes_kits() {
        assert!(is_kit(KIT));
        assert!(!is_kit("{\"pages\": []}"));
        assert!(!is_kit("not json"));
    }

    #[test]
    fn expands_pages_with_shared_refs() {
        let entities = unbundle("spring.json", KIT).unwrap();
        let pages: Vec<&RawEntity> = entities
            .iter()
            .filter(|e| e.kind == EntityKind::Page)
            .collect();
        assert_eq!(pages.len(), 3);

        // Every page references the same shared chrome; markup lives once.
        for page in &pages {
            assert_eq!(page.attr(SHARED_HEADER_ATTR), Some("spring-theme-shared-header"));
            assert_eq!(page.attr(SHARED_FOOTER_ATTR), Some("spring-theme-shared-footer"));
            assert!(!page.raw_markup.as_ref().unwrap().contains("Spring Shop"));
        }

        let sections: Vec<&RawEntity> = entities
            .iter()
            .filter(|e| e.kind == EntityKind::Section)
            .collect();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].attr(CHROME_KIND_ATTR), Some("header"));
    }

    #[test]
    fn kit_without_shared_chrome() {
        let kit = r#"{"kit": {"pages": [{"slug": "solo", "html": "<p>only page</p>"}]}}"#;
        let entities = unbundle("solo.json", kit).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].attr(SHARED_HEADER_ATTR), None);
    }

    #[test]
    fn unnamed_kit_uses_doc_name() {
        let kit = r#"{"kit": {"shared": {"header": "<header>H</header>"}, "pages": [{"slug": "p", "html": "<p>page body</p>"}]}}"#;
        let entities = unbundle("My Kit.json", kit).unwrap();
        assert_eq!(entities[0].source_id, "my-kit-shared-header");
    }
}
