use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical block types the editor understands. Everything the pipeline
/// emits must carry one of these; `Raw` is the preserve-the-markup fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockType {
    Header,
    Footer,
    Hero,
    Text,
    Image,
    Gallery,
    ProductGrid,
    Product,
    Banner,
    Testimonial,
    Form,
    Raw,
}

impl BlockType {
    pub const ALL: &'static [BlockType] = &[
        BlockType::Header,
        BlockType::Footer,
        BlockType::Hero,
        BlockType::Text,
        BlockType::Image,
        BlockType::Gallery,
        BlockType::ProductGrid,
        BlockType::Product,
        BlockType::Banner,
        BlockType::Testimonial,
        BlockType::Form,
        BlockType::Raw,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BlockType::Header => "header",
            BlockType::Footer => "footer",
            BlockType::Hero => "hero",
            BlockType::Text => "text",
            BlockType::Image => "image",
            BlockType::Gallery => "gallery",
            BlockType::ProductGrid => "productGrid",
            BlockType::Product => "product",
            BlockType::Banner => "banner",
            BlockType::Testimonial => "testimonial",
            BlockType::Form => "form",
            BlockType::Raw => "raw",
        }
    }

    pub fn from_name(name: &str) -> Option<BlockType> {
        BlockType::ALL.iter().copied().find(|t| t.name() == name)
    }
}

/// Property contract for one block type: which properties are required (with
/// their default when absent), which are merely allowed, and which must be
/// numeric. Everything else is dropped by the normalizer.
pub struct TypeSchema {
    pub required: &'static [(&'static str, &'static str)], // (name, default)
    pub optional: &'static [&'static str],
    pub numeric: &'static [&'static str],
}

/// Per-type property contracts. Defaults are what a freshly inserted editor
/// block would carry.
pub fn type_schema(kind: BlockType) -> TypeSchema {
    match kind {
        BlockType::Header => TypeSchema {
            required: &[("title", "")],
            optional: &["logoUrl", "links", "sticky"],
            numeric: &[],
        },
        BlockType::Footer => TypeSchema {
            required: &[("text", "")],
            optional: &["links", "copyright"],
            numeric: &[],
        },
        BlockType::Hero => TypeSchema {
            required: &[("heading", "")],
            optional: &["subheading", "imageUrl", "ctaText", "ctaUrl"],
            numeric: &[],
        },
        BlockType::Text => TypeSchema {
            required: &[("text", "")],
            optional: &["heading", "align"],
            numeric: &[],
        },
        BlockType::Image => TypeSchema {
            required: &[("src", "")],
            optional: &["alt", "caption", "width", "height"],
            numeric: &["width", "height"],
        },
        BlockType::Gallery => TypeSchema {
            required: &[("images", "[]")],
            optional: &["columns"],
            numeric: &["columns"],
        },
        BlockType::ProductGrid => TypeSchema {
            required: &[("columns", "3")],
            optional: &["heading", "productIds"],
            numeric: &["columns"],
        },
        BlockType::Product => TypeSchema {
            required: &[("title", ""), ("price", "0")],
            optional: &["currency", "imageUrl", "description", "ctaText", "ctaUrl"],
            numeric: &["price"],
        },
        BlockType::Banner => TypeSchema {
            required: &[("text", "")],
            optional: &["imageUrl", "linkUrl"],
            numeric: &[],
        },
        BlockType::Testimonial => TypeSchema {
            required: &[("quote", "")],
            optional: &["author", "role", "avatarUrl"],
            numeric: &[],
        },
        BlockType::Form => TypeSchema {
            required: &[("submitText", "Submit")],
            optional: &["fields", "action"],
            numeric: &[],
        },
        BlockType::Raw => TypeSchema {
            required: &[("html", "")],
            optional: &[],
            numeric: &[],
        },
    }
}

/// Tentatively classified fragment, prior to normalization. `kind = None`
/// means unclassified; confidence drives analyzer escalation.
#[derive(Debug, Clone)]
pub struct CandidateBlock {
    pub kind: Option<BlockType>,
    pub properties: BTreeMap<String, Value>,
    pub children: Vec<CandidateBlock>,
    pub confidence: f32,
}

impl CandidateBlock {
    pub fn new(kind: Option<BlockType>, confidence: f32) -> Self {
        CandidateBlock {
            kind,
            properties: BTreeMap::new(),
            children: Vec::new(),
            confidence,
        }
    }

    pub fn with_prop(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

/// Schema-validated block. Constructed only by the normalizer, which
/// guarantees the type is registered and required properties are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BlockType,
    pub properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Block>,
}

impl Block {
    /// Required-field contract check, used by composition and tests.
    pub fn satisfies_schema(&self) -> bool {
        let schema = type_schema(self.kind);
        schema
            .required
            .iter()
            .all(|(name, _)| self.properties.contains_key(*name))
            && self.children.iter().all(Block::satisfies_schema)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub blocks: Vec<Block>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<Block>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<Block>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_roundtrips_by_name() {
        for t in BlockType::ALL {
            assert_eq!(BlockType::from_name(t.name()), Some(*t));
        }
    }

    #[test]
    fn product_requires_title_and_price() {
        let schema = type_schema(BlockType::Product);
        let names: Vec<&str> = schema.required.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["title", "price"]);
    }

    #[test]
    fn satisfies_schema_checks_children() {
        let mut props = BTreeMap::new();
        props.insert("text".to_string(), Value::from("hi"));
        let bad_child = Block {
            id: "c1".into(),
            kind: BlockType::Product,
            properties: BTreeMap::new(), // missing title/price
            children: vec![],
        };
        let block = Block {
            id: "b1".into(),
            kind: BlockType::Text,
            properties: props,
            children: vec![bad_child],
        };
        assert!(!block.satisfies_schema());
    }
}
