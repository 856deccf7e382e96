use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::detect::Platform;
use crate::error::ImportError;

/// One document inside a bundle: an exported page, a theme/kit payload, or a
/// platform metadata file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocKind {
    Html,
    Json,
}

#[derive(Debug, Clone)]
pub struct SourceDoc {
    pub name: String,
    pub kind: DocKind,
    pub content: String,
}

/// Raw exported representation of a third-party store: a directory of
/// documents plus an optional declared platform. Read-only once loaded; docs
/// are sorted by name so every downstream pass sees a stable order.
#[derive(Debug, Clone)]
pub struct SourceBundle {
    pub root: PathBuf,
    pub docs: Vec<SourceDoc>,
    pub hint: Option<Platform>,
}

impl SourceBundle {
    /// Load a bundle directory. `manifest.json` (if present) may declare a
    /// platform hint; every other .html/.htm/.json file becomes a document.
    pub fn load(root: &Path) -> Result<SourceBundle, ImportError> {
        let entries = fs::read_dir(root)
            .map_err(|e| ImportError::BundleUnreadable(format!("{}: {}", root.display(), e)))?;

        let mut docs = Vec::new();
        let mut hint = None;

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n.to_string(),
                None => continue,
            };
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_ascii_lowercase();

            let kind = match ext.as_str() {
                "html" | "htm" => DocKind::Html,
                "json" => DocKind::Json,
                _ => continue,
            };

            let content = fs::read_to_string(&path).map_err(|e| {
                ImportError::BundleUnreadable(format!("{}: {}", path.display(), e))
            })?;

            if name == "manifest.json" {
                hint = parse_hint(&content);
                continue;
            }
            docs.push(SourceDoc { name, kind, content });
        }

        if docs.is_empty() {
            return Err(ImportError::BundleUnreadable(format!(
                "{}: no importable documents",
                root.display()
            )));
        }

        docs.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("loaded bundle: {} docs, hint={:?}", docs.len(), hint);

        Ok(SourceBundle {
            root: root.to_path_buf(),
            docs,
            hint,
        })
    }

    pub fn html_docs(&self) -> impl Iterator<Item = &SourceDoc> {
        self.docs.iter().filter(|d| d.kind == DocKind::Html)
    }

    pub fn json_docs(&self) -> impl Iterator<Item = &SourceDoc> {
        self.docs.iter().filter(|d| d.kind == DocKind::Json)
    }

    /// All document text, for signature scans that don't care which file a
    /// marker lives in.
    pub fn all_text(&self) -> impl Iterator<Item = &str> {
        self.docs.iter().map(|d| d.content.as_str())
    }
}

fn parse_hint(manifest: &str) -> Option<Platform> {
    let value: serde_json::Value = serde_json::from_str(manifest).ok()?;
    value
        .get("platform")
        .and_then(|p| p.as_str())
        .and_then(Platform::from_name)
}
