use crate::common::errors::AppError;
use crate::xlsx::cell_address::CellAddress;
use crate::xlsx::layout::AnchorSelector;
use crate::xlsx::xml_tree::{XmlDocument, XmlElement, XmlNode};
use serde::Serialize;
use tracing::{debug, warn};

const ANCHOR_KINDS: [&str; 3] = ["twoCellAnchor", "oneCellAnchor", "absoluteAnchor"];

/// Zero-based cell coordinate of an anchor corner (`xdr:from` / `xdr:to`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnchorPoint {
    pub col: u32,
    pub row: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnchorSummary {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub from: Option<AnchorPoint>,
    pub to: Option<AnchorPoint>,
    pub text: String,
}

/// A set of shape labels that belongs to whichever anchor contains `marker`.
///
/// Two footer boxes can both carry a `Fecha:` run; the marker (`Revisado:`,
/// `Aprobado:`) decides which value set applies to each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelGroup {
    pub marker: String,
    pub values: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct Drawing {
    doc: XmlDocument,
    changed: bool,
}

impl Drawing {
    pub fn parse(bytes: &[u8]) -> Result<Self, AppError> {
        let doc = XmlDocument::parse(bytes)?;
        if !doc.root.is("wsDr") {
            return Err(AppError::MalformedTemplate(format!(
                "drawing root is <{}>, expected <xdr:wsDr>",
                doc.root.name
            )));
        }
        Ok(Self {
            doc,
            changed: false,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, AppError> {
        self.doc.to_bytes()
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    fn anchors(&self) -> impl Iterator<Item = &XmlElement> {
        self.doc
            .root
            .elements()
            .filter(|el| ANCHOR_KINDS.contains(&el.local_name()))
    }

    fn anchors_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.doc
            .root
            .elements_mut()
            .filter(|el| ANCHOR_KINDS.contains(&el.local_name()))
    }

    pub fn summaries(&self) -> Vec<AnchorSummary> {
        self.anchors()
            .map(|anchor| AnchorSummary {
                kind: anchor.local_name().to_string(),
                name: anchor_name(anchor).map(str::to_string),
                from: anchor.child("from").and_then(read_point),
                to: anchor.child("to").and_then(read_point),
                text: anchor_text(anchor),
            })
            .collect()
    }

    /// Moves every anchor whose `from` row is at or below `pivot_row0` (zero
    /// based). Both corners move so the shape keeps its height.
    pub fn shift_anchors_from(&mut self, pivot_row0: u32, delta: i64) -> Result<usize, AppError> {
        if delta == 0 {
            return Ok(0);
        }
        let mut moved = 0;
        for anchor in self.anchors_mut() {
            let Some(from_row) = anchor.child("from").and_then(read_point).map(|p| p.row) else {
                continue;
            };
            if from_row < pivot_row0 {
                continue;
            }
            for corner in ["from", "to"] {
                if let Some(marker) = anchor.child_mut(corner) {
                    shift_marker_row(marker, delta)?;
                }
            }
            moved += 1;
        }
        if moved > 0 {
            self.changed = true;
        }
        debug!(pivot_row0, delta, anchors = moved, "shifted drawing anchors");
        Ok(moved)
    }

    /// Drops every anchor matched by one of `selectors`.
    pub fn remove_anchors(&mut self, selectors: &[AnchorSelector]) -> Result<usize, AppError> {
        let targets = selectors
            .iter()
            .map(AnchorTarget::resolve)
            .collect::<Result<Vec<_>, _>>()?;
        let before = self.doc.root.children.len();
        self.doc.root.children.retain(|node| match node {
            XmlNode::Element(el) if ANCHOR_KINDS.contains(&el.local_name()) => {
                !targets.iter().any(|t| t.matches(el))
            }
            _ => true,
        });
        let removed = before - self.doc.root.children.len();
        if removed > 0 {
            self.changed = true;
        }
        debug!(removed, "removed drawing anchors");
        Ok(removed)
    }

    /// Makes `text` the only run of the first paragraph of the shape picked
    /// by `selector`. The first existing run lends its properties to the new
    /// one. Returns `false` when no anchor holds a matching shape.
    pub fn set_shape_text(
        &mut self,
        selector: &AnchorSelector,
        text: &str,
        align: Option<&str>,
    ) -> Result<bool, AppError> {
        let target = AnchorTarget::resolve(selector)?;
        let written = match self.anchors_mut().find(|a| target.matches(a)) {
            Some(anchor) => write_shape_text(anchor, text, align),
            None => false,
        };
        if written {
            self.changed = true;
        } else {
            warn!(?selector, "no drawing shape matches the selector");
        }
        Ok(written)
    }

    /// Replaces label runs with `"<label> <value>"` inside anchors whose
    /// combined text contains a group's marker. The first matching group
    /// wins. Empty values leave the run alone.
    pub fn inject_labeled_text(&mut self, groups: &[LabelGroup]) -> usize {
        let mut written = 0;
        let mut matched_groups = vec![false; groups.len()];

        for anchor in self.anchors_mut() {
            let combined = anchor_text(anchor);
            let Some(group_idx) = groups.iter().position(|g| combined.contains(&g.marker)) else {
                continue;
            };
            matched_groups[group_idx] = true;
            let group = &groups[group_idx];

            anchor.for_each_descendant_mut("t", &mut |run: &mut XmlElement| {
                let current = run.text();
                let label = current.trim();
                let Some((label, value)) = group
                    .values
                    .iter()
                    .find(|(l, v)| l.as_str() == label && !v.trim().is_empty())
                else {
                    return;
                };
                run.set_text(&format!("{label} {}", value.trim()));
                written += 1;
            });
        }

        for (group, matched) in groups.iter().zip(matched_groups) {
            if !matched {
                warn!(marker = %group.marker, "no drawing shape carries this label");
            }
        }
        if written > 0 {
            self.changed = true;
        }
        written
    }
}

// Selector with its cell already turned into zero-based anchor coordinates.
enum AnchorTarget<'a> {
    Name(&'a str),
    At(AnchorPoint),
    FromRow(u32),
}

impl<'a> AnchorTarget<'a> {
    fn resolve(selector: &'a AnchorSelector) -> Result<Self, AppError> {
        Ok(match selector {
            AnchorSelector::Name(name) => AnchorTarget::Name(name.as_str()),
            AnchorSelector::FromCell(cell) => {
                let address = CellAddress::parse(cell)?;
                AnchorTarget::At(AnchorPoint {
                    col: address.column_number() - 1,
                    row: address.row - 1,
                })
            }
            AnchorSelector::FromRowAtLeast(row) => AnchorTarget::FromRow(row.saturating_sub(1)),
        })
    }

    fn matches(&self, anchor: &XmlElement) -> bool {
        let from = || anchor.child("from").and_then(read_point);
        match self {
            AnchorTarget::Name(name) => anchor_name(anchor) == Some(*name),
            AnchorTarget::At(point) => from() == Some(*point),
            AnchorTarget::FromRow(row) => from().is_some_and(|p| p.row >= *row),
        }
    }
}

fn write_shape_text(anchor: &mut XmlElement, text: &str, align: Option<&str>) -> bool {
    let Some(shape) = anchor.child_mut("sp") else {
        return false;
    };
    if shape.child("txBody").is_none() {
        let xdr = prefix_of(&shape.name).to_string();
        let mut body = XmlElement::new(&format!("{xdr}txBody"));
        body.push_element(XmlElement::new("a:bodyPr"));
        shape.push_element(body);
    }
    let Some(body) = shape.child_mut("txBody") else {
        return false;
    };
    let a = body
        .elements()
        .next()
        .map(|el| prefix_of(&el.name).to_string())
        .unwrap_or_else(|| "a:".to_string());
    if body.child("p").is_none() {
        body.push_element(XmlElement::new(&format!("{a}p")));
    }
    let Some(paragraph) = body.child_mut("p") else {
        return false;
    };

    let run_props = paragraph
        .child("r")
        .and_then(|run| run.child("rPr"))
        .cloned()
        .unwrap_or_else(|| XmlElement::new(&format!("{a}rPr")));
    paragraph.children.retain(|node| {
        !matches!(node, XmlNode::Element(el) if el.is("r") || el.is("br") || el.is("fld"))
    });
    if let Some(align) = align {
        if paragraph.child("pPr").is_none() {
            paragraph
                .children
                .insert(0, XmlNode::Element(XmlElement::new(&format!("{a}pPr"))));
        }
        if let Some(props) = paragraph.child_mut("pPr") {
            props.set_attr("algn", align);
        }
    }

    let mut t = XmlElement::new(&format!("{a}t"));
    t.set_text(text);
    let mut run = XmlElement::new(&format!("{a}r"));
    run.push_element(run_props);
    run.push_element(t);
    // Runs precede the paragraph's end properties.
    let at = paragraph
        .children
        .iter()
        .position(|node| matches!(node, XmlNode::Element(el) if el.is("endParaRPr")))
        .unwrap_or(paragraph.children.len());
    paragraph.children.insert(at, XmlNode::Element(run));
    true
}

fn prefix_of(name: &str) -> &str {
    match name.find(':') {
        Some(idx) => &name[..=idx],
        None => "",
    }
}

fn anchor_name(anchor: &XmlElement) -> Option<&str> {
    anchor
        .descendants("cNvPr")
        .into_iter()
        .next()
        .and_then(|el| el.attr("name"))
}

fn anchor_text(anchor: &XmlElement) -> String {
    anchor
        .descendants("t")
        .iter()
        .map(|t| t.text())
        .collect::<Vec<_>>()
        .join(" ")
}

fn read_point(marker: &XmlElement) -> Option<AnchorPoint> {
    let col = marker.child("col")?.text().trim().parse().ok()?;
    let row = marker.child("row")?.text().trim().parse().ok()?;
    Some(AnchorPoint { col, row })
}

fn shift_marker_row(marker: &mut XmlElement, delta: i64) -> Result<(), AppError> {
    let Some(row) = marker.child_mut("row") else {
        return Ok(());
    };
    let current: i64 = row.text().trim().parse().map_err(|_| {
        AppError::MalformedTemplate(format!("anchor row is not a number: {:?}", row.text()))
    })?;
    let target = current + delta;
    if target < 0 {
        return Err(AppError::InvalidInput(format!(
            "anchor row {current} shifted by {delta} leaves the sheet"
        )));
    }
    row.set_text(&target.to_string());
    Ok(())
}
