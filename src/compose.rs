//! Template composition.
//!
//! Binds current field values into a template, invoking the text fitter per
//! field, and produces a fully resolved document. The template is never
//! mutated; every print attempt gets a fresh [`ResolvedDocument`], so
//! concurrent requests can share one template safely.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use log::debug;
use qrcode::{Color, EcLevel, QrCode};

use crate::error::CompositionError;
use crate::fitter::fit;
use crate::fonts::Typesetter;
use crate::template::{
    EmbeddedRaster, FieldKind, FieldMetadata, FieldValues, Node, RasterNode, ResolvedDocument,
    Template, TextNode, VerticalBaseline,
};
use crate::TEXT_BOX_PADDING;

/// Factor applied to the resolved font size when a multi-line placeholder
/// declares no line advance of its own.
const DERIVED_ADVANCE_FACTOR: f32 = 1.25;

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// A resolved document plus the non-fatal problems met along the way.
#[derive(Debug)]
pub struct Composition {
    pub document: ResolvedDocument,
    pub issues: Vec<FieldIssue>,
}

/// A per-field problem that did not abort composition: the field resolved
/// to empty or raw content instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub reason: String,
}

/// Bind `values` into `template`.
///
/// Structural faults (duplicate ids, a field kind bound to an incompatible
/// node) fail the whole pass. Data faults in individual fields (malformed
/// date, undecodable image) are recorded as issues and never abort the
/// resolution of unrelated fields.
pub fn compose(
    template: &Template,
    values: &FieldValues,
    typesetter: &dyn Typesetter,
) -> Result<Composition, CompositionError> {
    template.validate()?;

    let mut nodes = template.document.nodes.clone();
    let mut issues = Vec::new();
    let box_width = template.document.width - 2.0 * TEXT_BOX_PADDING;

    for field in &template.fields {
        let node = nodes.iter_mut().find(|node| match node {
            Node::Text(t) => t.field.as_deref() == Some(field.id.as_str()),
            Node::Raster(r) => r.field.as_deref() == Some(field.id.as_str()),
            _ => false,
        });
        let Some(node) = node else {
            issues.push(FieldIssue {
                field: field.id.clone(),
                reason: "no placeholder node with this id".to_string(),
            });
            continue;
        };

        match (field.kind, node) {
            (FieldKind::Text | FieldKind::MultilineText | FieldKind::Date, Node::Text(text)) => {
                resolve_text(field, text, values, typesetter, box_width, &mut issues);
            }
            (FieldKind::Qr, Node::Raster(raster)) => {
                resolve_qr(field, raster, values, &mut issues);
            }
            (FieldKind::Image, Node::Raster(raster)) => {
                resolve_image(field, raster, values, &mut issues);
            }
            (kind, node) => {
                return Err(CompositionError::KindMismatch {
                    id: field.id.clone(),
                    kind: kind.as_str(),
                    node: match node {
                        Node::Rect(_) => "rect",
                        Node::Line(_) => "line",
                        Node::Text(_) => "text",
                        Node::Raster(_) => "raster",
                    },
                });
            }
        }
    }

    Ok(Composition {
        document: ResolvedDocument {
            width: template.document.width,
            height: template.document.height,
            nodes,
        },
        issues,
    })
}

fn resolve_text(
    field: &FieldMetadata,
    node: &mut TextNode,
    values: &FieldValues,
    typesetter: &dyn Typesetter,
    box_width: f32,
    issues: &mut Vec<FieldIssue>,
) {
    let raw = match values.text_of(&field.id) {
        Some(text) => text.to_string(),
        None => {
            issues.push(FieldIssue {
                field: field.id.clone(),
                reason: "binary value supplied for a text field".to_string(),
            });
            String::new()
        }
    };

    let content = if field.kind == FieldKind::Date && !raw.is_empty() {
        match format_date(&raw, field.format.as_deref()) {
            Ok(formatted) => formatted,
            Err(reason) => {
                issues.push(FieldIssue {
                    field: field.id.clone(),
                    reason,
                });
                raw
            }
        }
    } else {
        raw
    };

    let multiline = field.kind == FieldKind::MultilineText;
    let fitted = fit(
        typesetter,
        &content,
        box_width,
        node.font_size,
        node.weight,
        multiline,
    );
    debug!(
        "field {:?}: {} line(s) at size {}",
        field.id,
        fitted.lines.len(),
        fitted.size
    );

    let advance = node
        .line_advance
        .unwrap_or(DERIVED_ADVANCE_FACTOR * fitted.size);
    if node.baseline == VerticalBaseline::Middle && fitted.lines.len() > 1 {
        node.y -= (fitted.lines.len() - 1) as f32 * advance / 2.0;
    }
    node.font_size = fitted.size;
    node.line_advance = Some(advance);
    node.lines = fitted.lines;
    node.field = None;
}

fn resolve_qr(
    field: &FieldMetadata,
    node: &mut RasterNode,
    values: &FieldValues,
    issues: &mut Vec<FieldIssue>,
) {
    let data = match values.text_of(&field.id) {
        Some(text) => text,
        None => {
            issues.push(FieldIssue {
                field: field.id.clone(),
                reason: "binary value supplied for a qr field".to_string(),
            });
            return;
        }
    };
    if data.is_empty() {
        // Absent value: the placeholder box stays empty.
        return;
    }

    let level = match field.format.as_deref() {
        None | Some("M") => EcLevel::M,
        Some("L") => EcLevel::L,
        Some("Q") => EcLevel::Q,
        Some("H") => EcLevel::H,
        Some(other) => {
            issues.push(FieldIssue {
                field: field.id.clone(),
                reason: format!("unrecognized error-correction level {other:?}"),
            });
            EcLevel::M
        }
    };

    match QrCode::with_error_correction_level(data.as_bytes(), level) {
        Ok(code) => {
            let modules = code.width() as u32;
            let luma = code
                .to_colors()
                .iter()
                .map(|c| if *c == Color::Dark { 0u8 } else { 255u8 })
                .collect();
            debug!("field {:?}: qr symbol {}x{} modules", field.id, modules, modules);
            node.content = Some(EmbeddedRaster {
                width: modules,
                height: modules,
                luma,
            });
        }
        Err(err) => {
            issues.push(FieldIssue {
                field: field.id.clone(),
                reason: format!("qr encoding failed: {err:?}"),
            });
        }
    }
}

fn resolve_image(
    field: &FieldMetadata,
    node: &mut RasterNode,
    values: &FieldValues,
    issues: &mut Vec<FieldIssue>,
) {
    let Some(payload) = values.binary_of(&field.id) else {
        if values.get(&field.id).is_some() {
            issues.push(FieldIssue {
                field: field.id.clone(),
                reason: "text value supplied for an image field".to_string(),
            });
        }
        // Absent value: the placeholder box stays empty.
        return;
    };

    match image::load_from_memory(payload) {
        Ok(decoded) => {
            let grey = decoded.to_luma8();
            debug!(
                "field {:?}: image {}x{} px",
                field.id,
                grey.width(),
                grey.height()
            );
            node.content = Some(EmbeddedRaster {
                width: grey.width(),
                height: grey.height(),
                luma: grey.into_raw(),
            });
        }
        Err(err) => {
            issues.push(FieldIssue {
                field: field.id.clone(),
                reason: format!("image decoding failed: {err}"),
            });
        }
    }
}

/// Format a raw date value with the field's format hint.
///
/// Accepted inputs: RFC 3339, `%Y-%m-%d`, `%Y-%m-%dT%H:%M:%S`. Dates parse
/// to midnight so time specifiers in the hint stay valid.
fn format_date(raw: &str, hint: Option<&str>) -> Result<String, String> {
    let fmt = hint.unwrap_or(DEFAULT_DATE_FORMAT);
    let items: Vec<Item> = StrftimeItems::new(fmt).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(format!("malformed date format {fmt:?}"));
    }

    // Formatting always happens on an offset-carrying timestamp so every
    // strftime specifier stays renderable.
    let timestamp: DateTime<FixedOffset> = if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        dt
    } else if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        date.and_time(chrono::NaiveTime::MIN).and_utc().fixed_offset()
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        dt.and_utc().fixed_offset()
    } else {
        return Err(format!("unrecognized date value {raw:?}"));
    };

    Ok(timestamp.format_with_items(items.into_iter()).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::testing::FixedAdvance;
    use crate::fonts::FontWeight;
    use crate::template::{Document, FieldValue, HorizontalAnchor, Template};

    fn field(id: &str, kind: FieldKind, format: Option<&str>) -> FieldMetadata {
        FieldMetadata {
            id: id.to_string(),
            kind,
            label: String::new(),
            format: format.map(str::to_string),
        }
    }

    fn text_placeholder(id: &str, base_size: f32) -> Node {
        Node::Text(TextNode {
            field: Some(id.to_string()),
            x: 192.0,
            y: 100.0,
            font_size: base_size,
            weight: FontWeight::Normal,
            anchor: HorizontalAnchor::Middle,
            baseline: VerticalBaseline::Baseline,
            line_advance: None,
            lines: vec!["sample".to_string()],
        })
    }

    fn raster_placeholder(id: &str) -> Node {
        Node::Raster(RasterNode {
            field: Some(id.to_string()),
            x: 20.0,
            y: 20.0,
            width: 80.0,
            height: 80.0,
            content: None,
        })
    }

    fn template(nodes: Vec<Node>, fields: Vec<FieldMetadata>) -> Template {
        Template::new(
            Document {
                width: 384.0,
                height: 240.0,
                nodes,
            },
            fields,
        )
        .unwrap()
    }

    fn text_node(composition: &Composition, index: usize) -> &TextNode {
        match &composition.document.nodes[index] {
            Node::Text(t) => t,
            other => panic!("unexpected node {other:?}"),
        }
    }

    fn raster_node(composition: &Composition, index: usize) -> &RasterNode {
        match &composition.document.nodes[index] {
            Node::Raster(r) => r,
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn substitutes_text_and_clears_the_binding() {
        let template = template(
            vec![text_placeholder("name", 32.0)],
            vec![field("name", FieldKind::Text, None)],
        );
        let mut values = FieldValues::new();
        values.insert_text("name", "Hello");

        let composition = compose(&template, &values, &FixedAdvance::new()).unwrap();
        let node = text_node(&composition, 0);
        assert_eq!(node.lines, vec!["Hello".to_string()]);
        assert_eq!(node.font_size, 32.0);
        assert!(node.field.is_none());
        assert!(composition.issues.is_empty());
        // template itself untouched
        match &template.document.nodes[0] {
            Node::Text(t) => assert_eq!(t.lines, vec!["sample".to_string()]),
            _ => unreachable!(),
        }
    }

    #[test]
    fn missing_value_resolves_to_empty_content() {
        let template = template(
            vec![text_placeholder("name", 32.0)],
            vec![field("name", FieldKind::Text, None)],
        );
        let composition = compose(&template, &FieldValues::new(), &FixedAdvance::new()).unwrap();
        assert!(text_node(&composition, 0).lines.is_empty());
        assert!(composition.issues.is_empty());
    }

    #[test]
    fn unknown_value_ids_are_ignored() {
        let template = template(vec![], vec![]);
        let mut values = FieldValues::new();
        values.insert_text("ghost", "boo");
        let composition = compose(&template, &values, &FixedAdvance::new()).unwrap();
        assert!(composition.issues.is_empty());
    }

    #[test]
    fn middle_baseline_block_is_shifted_up() {
        let mut node = text_placeholder("body", 20.0);
        if let Node::Text(t) = &mut node {
            t.baseline = VerticalBaseline::Middle;
            t.line_advance = Some(24.0);
        }
        let template = template(vec![node], vec![field("body", FieldKind::MultilineText, None)]);
        let mut values = FieldValues::new();
        values.insert_text("body", "one\ntwo\nthree");

        let composition = compose(&template, &values, &FixedAdvance::new()).unwrap();
        let node = text_node(&composition, 0);
        assert_eq!(node.lines.len(), 3);
        // shifted up by (3-1) * 24 / 2 from the declared 100.0
        assert_eq!(node.y, 100.0 - 24.0);
        assert_eq!(node.line_advance, Some(24.0));
    }

    #[test]
    fn derived_advance_is_a_quarter_over_the_resolved_size() {
        let template = template(
            vec![text_placeholder("body", 20.0)],
            vec![field("body", FieldKind::MultilineText, None)],
        );
        let mut values = FieldValues::new();
        values.insert_text("body", "a\nb");
        let composition = compose(&template, &values, &FixedAdvance::new()).unwrap();
        let node = text_node(&composition, 0);
        assert_eq!(node.line_advance, Some(1.25 * node.font_size));
    }

    #[test]
    fn date_field_formats_through_the_hint() {
        let template = template(
            vec![text_placeholder("when", 24.0)],
            vec![field("when", FieldKind::Date, Some("%d.%m.%Y"))],
        );
        let mut values = FieldValues::new();
        values.insert_text("when", "2024-03-09");
        let composition = compose(&template, &values, &FixedAdvance::new()).unwrap();
        assert_eq!(text_node(&composition, 0).lines, vec!["09.03.2024".to_string()]);
        assert!(composition.issues.is_empty());
    }

    #[test]
    fn malformed_date_keeps_raw_value_and_reports_the_field() {
        let template = template(
            vec![text_placeholder("when", 24.0)],
            vec![field("when", FieldKind::Date, None)],
        );
        let mut values = FieldValues::new();
        values.insert_text("when", "not a date");
        let composition = compose(&template, &values, &FixedAdvance::new()).unwrap();
        assert_eq!(text_node(&composition, 0).lines, vec!["not a date".to_string()]);
        assert_eq!(composition.issues.len(), 1);
        assert_eq!(composition.issues[0].field, "when");
    }

    #[test]
    fn qr_field_splices_an_embedded_symbol() {
        let template = template(
            vec![raster_placeholder("code")],
            vec![field("code", FieldKind::Qr, Some("H"))],
        );
        let mut values = FieldValues::new();
        values.insert_text("code", "https://example.com");
        let composition = compose(&template, &values, &FixedAdvance::new()).unwrap();
        let raster = raster_node(&composition, 0);
        let content = raster.content.as_ref().unwrap();
        assert_eq!(content.width, content.height);
        assert_eq!(content.luma.len(), (content.width * content.height) as usize);
        assert!(content.luma.iter().all(|&l| l == 0 || l == 255));
        assert!(content.luma.iter().any(|&l| l == 0));
    }

    #[test]
    fn absent_qr_value_skips_the_placeholder_silently() {
        let template = template(
            vec![raster_placeholder("code")],
            vec![field("code", FieldKind::Qr, None)],
        );
        let composition = compose(&template, &FieldValues::new(), &FixedAdvance::new()).unwrap();
        assert!(raster_node(&composition, 0).content.is_none());
        assert!(composition.issues.is_empty());
    }

    #[test]
    fn image_field_decodes_the_payload() {
        let mut png = std::io::Cursor::new(Vec::new());
        image::DynamicImage::new_rgba8(2, 2)
            .write_to(&mut png, image::ImageFormat::Png)
            .unwrap();

        let template = template(
            vec![raster_placeholder("photo")],
            vec![field("photo", FieldKind::Image, None)],
        );
        let mut values = FieldValues::new();
        values.insert_binary("photo", png.into_inner());
        let composition = compose(&template, &values, &FixedAdvance::new()).unwrap();
        let content = raster_node(&composition, 0).content.as_ref().unwrap();
        assert_eq!((content.width, content.height), (2, 2));
    }

    #[test]
    fn undecodable_image_is_an_issue_not_an_error() {
        let template = template(
            vec![raster_placeholder("photo")],
            vec![field("photo", FieldKind::Image, None)],
        );
        let mut values = FieldValues::new();
        values.insert_binary("photo", vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let composition = compose(&template, &values, &FixedAdvance::new()).unwrap();
        assert!(raster_node(&composition, 0).content.is_none());
        assert_eq!(composition.issues.len(), 1);
    }

    #[test]
    fn binary_value_for_text_field_is_reported() {
        let template = template(
            vec![text_placeholder("name", 32.0)],
            vec![field("name", FieldKind::Text, None)],
        );
        let mut values = FieldValues::new();
        values.insert_binary("name", vec![1, 2, 3]);
        let composition = compose(&template, &values, &FixedAdvance::new()).unwrap();
        assert!(text_node(&composition, 0).lines.is_empty());
        assert_eq!(composition.issues.len(), 1);
    }

    #[test]
    fn kind_bound_to_wrong_node_is_structural() {
        let template = template(
            vec![raster_placeholder("name")],
            vec![field("name", FieldKind::Text, None)],
        );
        let mut values = FieldValues::new();
        values.insert_text("name", "x");
        let err = compose(&template, &values, &FixedAdvance::new()).unwrap_err();
        assert!(matches!(err, CompositionError::KindMismatch { .. }));
    }

    #[test]
    fn value_enum_distinguishes_text_and_binary() {
        let mut values = FieldValues::new();
        values.insert_text("a", "x");
        values.insert_binary("b", vec![1]);
        assert_eq!(values.get("a"), Some(&FieldValue::Text("x".to_string())));
        assert_eq!(values.get("b"), Some(&FieldValue::Binary(vec![1])));
    }
}
