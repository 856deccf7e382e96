//! Page composition: normalized blocks are assembled into the final Page in
//! source document order, chrome is attached at most once, and kit pages get
//! their shared header/footer resolved by reference.

use std::collections::BTreeMap;

use crate::error::ImportError;
use crate::report::{Issue, Stage};
use crate::schema::{Block, Page};

/// Shared chrome blocks materialized by the kit unbundler, keyed by section
/// id. One entry serves every page that references it.
pub type SharedChrome = BTreeMap<String, Block>;

pub struct PageInputs {
    pub slug: String,
    pub title: String,
    pub blocks: Vec<Block>,
    pub header: Option<Block>,
    pub footer: Option<Block>,
    pub shared_header_ref: Option<String>,
    pub shared_footer_ref: Option<String>,
}

/// Assemble one page. `Err(EmptyPage)` means the page had no content blocks
/// and must be recorded as Skipped, never emitted.
pub fn compose(
    inputs: PageInputs,
    shared: &SharedChrome,
    issues: &mut Vec<Issue>,
) -> Result<Page, ImportError> {
    // The normalizer guarantees the contract; anything that slips through is
    // dropped here rather than emitted malformed.
    let mut blocks = inputs.blocks;
    blocks.retain(|block| {
        if block.satisfies_schema() {
            return true;
        }
        let violation = ImportError::SchemaViolation {
            block_type: block.kind.name().to_string(),
            reason: "missing required properties".to_string(),
        };
        issues.push(
            Issue::new(Stage::Composing, "malformed block dropped at composition")
                .with_detail(format!("{}: {}", block.id, violation)),
        );
        false
    });

    if blocks.is_empty() {
        return Err(ImportError::EmptyPage(inputs.slug));
    }

    let header = resolve_chrome(
        inputs.header,
        inputs.shared_header_ref.as_deref(),
        shared,
        "header",
        &inputs.slug,
        issues,
    );
    let footer = resolve_chrome(
        inputs.footer,
        inputs.shared_footer_ref.as_deref(),
        shared,
        "footer",
        &inputs.slug,
        issues,
    );

    Ok(Page {
        id: format!("page-{}", inputs.slug.replace('/', "-")),
        slug: inputs.slug,
        title: inputs.title,
        blocks,
        header,
        footer,
    })
}

/// A page's own detected chrome wins; a kit reference fills the gap. A
/// dangling reference degrades to no chrome, reported.
fn resolve_chrome(
    own: Option<Block>,
    shared_ref: Option<&str>,
    shared: &SharedChrome,
    kind: &str,
    slug: &str,
    issues: &mut Vec<Issue>,
) -> Option<Block> {
    if own.is_some() {
        return own;
    }
    let id = shared_ref?;
    match shared.get(id) {
        Some(block) => Some(block.clone()),
        None => {
            issues.push(
                Issue::new(
                    Stage::Composing,
                    format!("shared {} reference could not be resolved", kind),
                )
                .with_detail(format!("{}: {}", slug, id)),
            );
            None
        }
    }
}
