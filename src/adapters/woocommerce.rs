//! WooCommerce (WordPress) export adapter: wp-json REST listings for pages
//! and products, saved theme pages, uploads-directory assets.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{slug_from_name, ExtractResult, PlatformAdapter, RawEntity};
use crate::bundle::SourceBundle;
use crate::detect::Platform;
use crate::error::ImportError;

static UPLOADS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^"'\s)]+/wp-content/uploads/[^"'\s)]+"#).unwrap()
});

pub struct WooCommerceAdapter;

impl PlatformAdapter for WooCommerceAdapter {
    fn platform(&self) -> Option<Platform> {
        Some(Platform::WooCommerce)
    }

    fn extract(&self, bundle: &SourceBundle) -> ExtractResult {
        let mut out = Vec::new();

        for doc in bundle.json_docs() {
            match doc.name.as_str() {
                "pages.json" => extract_pages(&doc.content, &mut out),
                "products.json" => extract_products(&doc.content, &mut out),
                _ => {}
            }
        }

        for doc in bundle.html_docs() {
            out.push(Ok(RawEntity::page(doc.name.clone(), doc.content.clone())
                .with_attr("slug", slug_from_name(&doc.name))));
            for m in UPLOADS_RE.find_iter(&doc.content) {
                out.push(Ok(RawEntity::asset(m.as_str(), &doc.name)));
            }
        }

        out
    }
}

// wp-json lists are bare arrays; titles/content are {"rendered": "..."}.
fn extract_pages(content: &str, out: &mut ExtractResult) {
    let listing: Vec<Value> = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            out.push(Err(ImportError::AdapterExtractionFailed {
                source_id: "pages.json".into(),
                reason: e.to_string(),
            }));
            return;
        }
    };

    for (i, page) in listing.iter().enumerate() {
        let source_id = format!("pages.json#{}", i);
        let slug = page.get("slug").and_then(Value::as_str);
        let body = rendered(page, "content");
        match (slug, body) {
            (Some(slug), Some(body)) => {
                let title = rendered(page, "title").unwrap_or(slug);
                out.push(Ok(RawEntity::page(source_id, body)
                    .with_attr("slug", slug)
                    .with_attr("title", title)));
            }
            _ => out.push(Err(ImportError::AdapterExtractionFailed {
                source_id,
                reason: "page entry missing slug or rendered content".into(),
            })),
        }
    }
}

fn extract_products(content: &str, out: &mut ExtractResult) {
    let listing: Vec<Value> = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            out.push(Err(ImportError::AdapterExtractionFailed {
                source_id: "products.json".into(),
                reason: e.to_string(),
            }));
            return;
        }
    };

    for (i, product) in listing.iter().enumerate() {
        let source_id = format!("products.json#{}", i);
        let slug = product.get("slug").and_then(Value::as_str);
        let name = product.get("name").and_then(Value::as_str);
        let (Some(slug), Some(name)) = (slug, name) else {
            out.push(Err(ImportError::AdapterExtractionFailed {
                source_id,
                reason: "product entry missing slug or name".into(),
            }));
            continue;
        };

        let price = product
            .get("price")
            .map(|p| match p {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "0".into());
        let description = product
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("");

        let mut entity = RawEntity::page(source_id, description)
            .with_attr("slug", format!("product/{}", slug))
            .with_attr("title", name)
            .with_attr("entity_type", "product")
            .with_attr("product_title", name)
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

fn rendered<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key)?.get("rendered")?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{DocKind, SourceDoc};
    use std::path::PathBuf;

    #[test]
    fn wp_json_shapes_parse() {
        let pages = r#"[
            {"slug": "about", "title": {"rendered": "About"}, "content": {"rendered": "<p>Hi</p>"}},
            {"slug": "broken"}
        ]"#;
        let bundle = SourceBundle {
            root: PathBuf::from("test"),
            docs: vec![SourceDoc {
                name: "pages.json".into(),
                kind: DocKind::Json,
                content: pages.into(),
            }],
            hint: None,
        };
        let entities = WooCommerceAdapter.extract(&bundle);
        assert_eq!(entities.len(), 2);
        let page = entities[0].as_ref().unwrap();
        assert_eq!(page.attr("title"), Some("About"));
        assert!(entities[1].is_err());
    }

    #[test]
    fn product_price_coerced_from_number() {
        let products = r#"[{"slug": "mug", "name": "Mug", "price": 12.5}]"#;
        let bundle = SourceBundle {
            root: PathBuf::from("test"),
            docs: vec![SourceDoc {
                name: "products.json".into(),
                kind: DocKind::Json,
                content: products.into(),
            }],
            hint: None,
        };
        let entities = WooCommerceAdapter.extract(&bundle);
        let product = entities[0].as_ref().unwrap();
        assert_eq!(product.attr("product_price"), Some("12.5"));
    }
}
