//! Unknown-platform fallback. Performs no platform-specific parsing at all:
//! each HTML document becomes one page candidate and everything else is left
//! to the content extractors downstream.

use super::{slug_from_name, ExtractResult, PlatformAdapter, RawEntity};
use crate::bundle::SourceBundle;
use crate::detect::Platform;
use crate::extract::first_heading;

pub struct GenericAdapter;

impl PlatformAdapter for GenericAdapter {
    fn platform(&self) -> Option<Platform> {
        None
    }

    fn extract(&self, bundle: &SourceBundle) -> ExtractResult {
        bundle
            .html_docs()
            .map(|doc| {
                let mut entity = RawEntity::page(doc.name.clone(), doc.content.clone())
                    .with_attr("slug", slug_from_name(&doc.name));
                if let Some(heading) = first_heading(&doc.content) {
                    entity = entity.with_attr("title", heading);
                }
                Ok(entity)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{DocKind, SourceDoc};
    use std::path::PathBuf;

    #[test]
    fn one_entity_per_html_doc() {
        let bundle = SourceBundle {
            root: PathBuf::from("test"),
            docs: vec![
                SourceDoc {
                    name: "home.html".into(),
                    kind: DocKind::Html,
                    content: "<h1>Home sweet home</h1>".into(),
                },
                SourceDoc {
                    name: "data.json".into(),
                    kind: DocKind::Json,
                    content: "{}".into(),
                },
            ],
            hint: None,
        };
        let entities = GenericAdapter.extract(&bundle);
        assert_eq!(entities.len(), 1);
        let page = entities[0].as_ref().unwrap();
        assert_eq!(page.attr("slug"), Some("home"));
        assert_eq!(page.attr("title"), Some("Home sweet home"));
    }
}
