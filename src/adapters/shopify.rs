//! Shopify export adapter. Knows the export's shape directly: `pages.json`
//! and `products.json` API listings plus saved theme pages, with assets on
//! the Shopify CDN. No heuristics; malformed entries fail individually.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{slug_from_name, ExtractResult, PlatformAdapter, RawEntity};
use crate::bundle::SourceBundle;
use crate::detect::Platform;
use crate::error::ImportError;

static CDN_ASSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://cdn\.shopify(?:cdn)?\.(?:com|net)/[^"'\s)]+"#).unwrap()
});

pub struct ShopifyAdapter;

impl PlatformAdapter for ShopifyAdapter {
    fn platform(&self) -> Option<Platform> {
        Some(Platform::Shopify)
    }

    fn extract(&self, bundle: &SourceBundle) -> ExtractResult {
        let mut out = Vec::new();

        for doc in bundle.json_docs() {
            match doc.name.as_str() {
                "pages.json" => extract_pages(&doc.content, &mut out),
                "products.json" => extract_products(&doc.content, &mut out),
                _ => {} // kit payloads are expanded before adapters run
            }
        }

        for doc in bundle.html_docs() {
            out.push(Ok(RawEntity::page(doc.name.clone(), doc.content.clone())
                .with_attr("slug", slug_from_name(&doc.name))));
            for m in CDN_ASSET_RE.find_iter(&doc.content) {
                out.push(Ok(RawEntity::asset(m.as_str(), &doc.name)));
            }
        }

        out
    }
}

fn extract_pages(content: &str, out: &mut ExtractResult) {
    let listing: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            out.push(Err(ImportError::AdapterExtractionFailed {
                source_id: "pages.json".into(),
                reason: e.to_string(),
            }));
            return;
        }
    };

    for (i, page) in array_of(&listing, "pages").iter().enumerate() {
        let source_id = format!("pages.json#{}", i);
        let handle = page.get("handle").and_then(Value::as_str);
        let body = page.get("body_html").and_then(Value::as_str);
        match (handle, body) {
            (Some(handle), Some(body)) => {
                let title = page
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or(handle);
                out.push(Ok(RawEntity::page(source_id, body)
                    .with_attr("slug", handle)
                    .with_attr("title", title)));
            }
            _ => out.push(Err(ImportError::AdapterExtractionFailed {
                source_id,
                reason: "page entry missing handle or body_html".into(),
            })),
        }
    }
}

fn extract_products(content: &str, out: &mut ExtractResult) {
    let listing: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            out.push(Err(ImportError::AdapterExtractionFailed {
                source_id: "products.json".into(),
                reason: e.to_string(),
            }));
            return;
        }
    };

    for (i, product) in array_of(&listing, "products").iter().enumerate() {
        let source_id = format!("products.json#{}", i);
        let handle = product.get("handle").and_then(Value::as_str);
        let title = product.get("title").and_then(Value::as_str);
        let (Some(handle), Some(title)) = (handle, title) else {
            out.push(Err(ImportError::AdapterExtractionFailed {
                source_id,
                reason: "product entry missing handle or title".into(),
            }));
            continue;
        };

        let price = product
            .get("variants")
            .and_then(Value::as_array)
            .and_then(|v| v.first())
            .and_then(|v| v.get("price"))
            .map(|p| match p {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "0".into());

        let body = product
            .get("body_html")
            .and_then(Value::as_str)
            .unwrap_or("");

        let mut entity = RawEntity::page(source_id, body)
            .with_attr("slug", format!("products/{}", handle))
            .with_attr("title", title)
            .with_attr("entity_type", "product")
            .with_attr("product_title", title)
            .with_attr("product_price", price);

        if let Some(src) = product
            .get("images")
            .and_then(Value::as_array)
            .and_then(|imgs| imgs.first())
            .and_then(|img| img.get("src"))
            .and_then(Value::as_str)
        {
            entity = entity.with_attr("product_image", src);
            out.push(Ok(RawEntity::asset(src, "products.json")));
        }
        out.push(Ok(entity));
    }
}

fn array_of<'a>(value: &'a Value, key: &str) -> Vec<&'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|a| a.iter().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::EntityKind;
    use crate::bundle::{DocKind, SourceDoc};
    use std::path::PathBuf;

    fn bundle(docs: Vec<SourceDoc>) -> SourceBundle {
        SourceBundle {
            root: PathBuf::from("test"),
            docs,
            hint: Some(Platform::Shopify),
        }
    }

    fn json_doc(name: &str, content: &str) -> SourceDoc {
        SourceDoc {
            name: name.into(),
            kind: DocKind::Json,
            content: content.into(),
        }
    }

    #[test]
    fn extracts_pages_and_products() {
        let pages = r#"{"pages": [
            {"handle": "about", "title": "About Us", "body_html": "<p>We sell things.</p>"}
        ]}"#;
        let products = r#"{"products": [
            {"handle": "mug", "title": "Mug", "body_html": "<p>A mug.</p>",
             "variants": [{"price": "12.00"}],
             "images": [{"src": "https://cdn.shopify.com/s/files/mug.jpg"}]}
        ]}"#;
        let entities = ShopifyAdapter.extract(&bundle(vec![
            json_doc("pages.json", pages),
            json_doc("products.json", products),
        ]));

        let ok: Vec<&RawEntity> = entities.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(ok.iter().filter(|e| e.kind == EntityKind::Page).count(), 2);
        assert_eq!(ok.iter().filter(|e| e.kind == EntityKind::Asset).count(), 1);

        let product = ok
            .iter()
            .find(|e| e.attr("entity_type") == Some("product"))
            .unwrap();
        assert_eq!(product.attr("product_price"), Some("12.00"));
        assert_eq!(product.attr("slug"), Some("products/mug"));
    }

    #[test]
    fn malformed_entry_fails_alone() {
        let pages = r#"{"pages": [
            {"title": "No handle here"},
            {"handle": "ok", "body_html": "<p>fine</p>"}
        ]}"#;
        let entities = ShopifyAdapter.extract(&bundle(vec![json_doc("pages.json", pages)]));
        assert_eq!(entities.len(), 2);
        assert!(entities[0].is_err());
        assert!(entities[1].is_ok());
    }

    #[test]
    fn deterministic_extraction() {
        let products = r#"{"products": [
            {"handle": "a", "title": "A", "variants": [{"price": 5}]},
            {"handle": "b", "title": "B"}
        ]}"#;
        let b = bundle(vec![json_doc("products.json", products)]);
        let first: Vec<String> = ShopifyAdapter
            .extract(&b)
            .iter()
            .filter_map(|r| r.as_ref().ok().map(|e| e.source_id.clone()))
            .collect();
        let second: Vec<String> = ShopifyAdapter
            .extract(&b)
            .iter()
            .filter_map(|r| r.as_ref().ok().map(|e| e.source_id.clone()))
            .collect();
        assert_eq!(first, second);
    }
}
