//! Template and document model.
//!
//! All types derive `Serialize + Deserialize` so the same types work for
//! both Rust API construction and the JSON the editing UI stores. A
//! [`Template`] is immutable once loaded; composition copies it into a fresh
//! [`ResolvedDocument`] per print attempt and never mutates it in place.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CompositionError;
use crate::fonts::FontWeight;

/// A reusable label layout: a vector document plus the named, typed
/// placeholder fields the UI lets the user edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub document: Document,
    #[serde(default)]
    pub fields: Vec<FieldMetadata>,
}

impl Template {
    pub fn new(document: Document, fields: Vec<FieldMetadata>) -> Result<Self, CompositionError> {
        let template = Template { document, fields };
        template.validate()?;
        Ok(template)
    }

    /// Field ids must be unique within a template. Deserialization does not
    /// enforce this, so composition re-checks before resolving anything.
    pub fn validate(&self) -> Result<(), CompositionError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.id.as_str()) {
                return Err(CompositionError::DuplicateFieldId(field.id.clone()));
            }
        }
        Ok(())
    }

    pub fn field(&self, id: &str) -> Option<&FieldMetadata> {
        self.fields.iter().find(|f| f.id == id)
    }
}

/// Vector markup tree in template units, origin top-left.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub nodes: Vec<Node>,
}

/// One element of the document tree.
///
/// The set is closed: the rasterizer matches exhaustively and the compiler
/// flags every site when a new kind is added.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Rect(RectNode),
    Line(LineNode),
    Text(TextNode),
    Raster(RasterNode),
}

/// Filled black rectangle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RectNode {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Axis-aligned stroke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineNode {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f32,
}

fn default_stroke_width() -> f32 {
    1.0
}

fn default_font_size() -> f32 {
    24.0
}

/// Text run, either static content or a placeholder bound to a field.
///
/// `y` is the baseline of the first line. A placeholder's `lines` hold the
/// template's sample content and are replaced wholesale by composition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextNode {
    /// Field id this node is a placeholder for; `None` for static text.
    #[serde(default)]
    pub field: Option<String>,
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    #[serde(default)]
    pub weight: FontWeight,
    #[serde(default)]
    pub anchor: HorizontalAnchor,
    #[serde(default)]
    pub baseline: VerticalBaseline,
    /// Baseline-to-baseline distance declared by the template. When absent,
    /// composition derives 1.25 x the resolved font size.
    #[serde(default)]
    pub line_advance: Option<f32>,
    #[serde(default)]
    pub lines: Vec<String>,
}

/// Embedded raster content, or a placeholder box for a QR/image field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterNode {
    /// Field id this node is a placeholder for; `None` for embedded content.
    #[serde(default)]
    pub field: Option<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Resolved pixel content (populated by composition).
    #[serde(skip)]
    pub content: Option<EmbeddedRaster>,
}

/// Greyscale pixels spliced into the document by composition, row-major,
/// 0 = black.
#[derive(Debug, Clone)]
pub struct EmbeddedRaster {
    pub width: u32,
    pub height: u32,
    pub luma: Vec<u8>,
}

/// Horizontal anchor of a text run relative to its `x` coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalAnchor {
    #[default]
    Start,
    Middle,
    End,
}

/// Vertical anchoring of a multi-line block.
///
/// Only `Middle` affects layout: the block is shifted up so it stays
/// vertically centered regardless of line count. Every other anchor leaves
/// the first baseline where the template put it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalBaseline {
    #[default]
    Baseline,
    Top,
    Middle,
    Bottom,
}

/// Declared kind of a placeholder field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    Text,
    MultilineText,
    Date,
    Qr,
    Image,
}

impl FieldKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::MultilineText => "multiline-text",
            Self::Date => "date",
            Self::Qr => "qr",
            Self::Image => "image",
        }
    }
}

/// Metadata describing one editable field of a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub id: String,
    pub kind: FieldKind,
    /// Human-readable label shown by the editing UI.
    #[serde(default)]
    pub label: String,
    /// Format hint: a chrono format string for `date` fields, an error
    /// correction level (`L`/`M`/`Q`/`H`) for `qr` fields.
    #[serde(default)]
    pub format: Option<String>,
}

/// Current value of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Binary(Vec<u8>),
}

/// Mapping from field id to its current value, supplied per print request.
///
/// Fields without an entry resolve to empty content; entries whose id no
/// template field declares are ignored.
#[derive(Debug, Clone, Default)]
pub struct FieldValues {
    values: HashMap<String, FieldValue>,
}

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_text(&mut self, id: impl Into<String>, value: impl Into<String>) {
        self.values.insert(id.into(), FieldValue::Text(value.into()));
    }

    pub fn insert_binary(&mut self, id: impl Into<String>, value: Vec<u8>) {
        self.values.insert(id.into(), FieldValue::Binary(value));
    }

    pub fn get(&self, id: &str) -> Option<&FieldValue> {
        self.values.get(id)
    }

    /// Text content of a field; empty when the entry is missing, `None`
    /// when the entry holds binary data.
    pub fn text_of(&self, id: &str) -> Option<&str> {
        match self.values.get(id) {
            None => Some(""),
            Some(FieldValue::Text(s)) => Some(s),
            Some(FieldValue::Binary(_)) => None,
        }
    }

    pub fn binary_of(&self, id: &str) -> Option<&[u8]> {
        match self.values.get(id) {
            Some(FieldValue::Binary(b)) => Some(b),
            _ => None,
        }
    }
}

/// A template with every placeholder replaced by concrete content for one
/// print request. Owned by a single composition pass; never mutated after
/// creation.
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<Node>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_field(id: &str) -> FieldMetadata {
        FieldMetadata {
            id: id.to_string(),
            kind: FieldKind::Text,
            label: String::new(),
            format: None,
        }
    }

    #[test]
    fn duplicate_field_ids_rejected() {
        let doc = Document {
            width: 100.0,
            height: 50.0,
            nodes: vec![],
        };
        let err = Template::new(doc, vec![text_field("a"), text_field("a")]).unwrap_err();
        assert_eq!(err, CompositionError::DuplicateFieldId("a".to_string()));
    }

    #[test]
    fn template_round_trips_through_json() {
        let json = r#"{
            "document": {
                "width": 320.0,
                "height": 240.0,
                "nodes": [
                    { "type": "text", "field": "name", "x": 160.0, "y": 60.0,
                      "font_size": 32.0, "anchor": "middle" },
                    { "type": "rect", "x": 0.0, "y": 200.0, "width": 320.0, "height": 4.0 },
                    { "type": "raster", "field": "code", "x": 220.0, "y": 100.0,
                      "width": 80.0, "height": 80.0 }
                ]
            },
            "fields": [
                { "id": "name", "kind": "text", "label": "Name" },
                { "id": "code", "kind": "qr", "format": "H" }
            ]
        }"#;
        let template: Template = serde_json::from_str(json).unwrap();
        template.validate().unwrap();
        assert_eq!(template.fields.len(), 2);
        assert_eq!(template.field("code").unwrap().kind, FieldKind::Qr);
        match &template.document.nodes[0] {
            Node::Text(t) => {
                assert_eq!(t.field.as_deref(), Some("name"));
                assert_eq!(t.anchor, HorizontalAnchor::Middle);
                assert_eq!(t.baseline, VerticalBaseline::Baseline);
            }
            other => panic!("unexpected node {other:?}"),
        }

        let back = serde_json::to_string(&template).unwrap();
        let again: Template = serde_json::from_str(&back).unwrap();
        assert_eq!(again.fields.len(), template.fields.len());
    }

    #[test]
    fn missing_value_reads_as_empty_text() {
        let values = FieldValues::new();
        assert_eq!(values.text_of("anything"), Some(""));
        assert!(values.binary_of("anything").is_none());
    }
}
