use crate::common::errors::AppError;
use crate::xlsx::xml_tree::{XmlDocument, XmlElement, XmlNode};
use std::collections::HashMap;
use tracing::debug;

const SST_NAMESPACE: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

/// Document-wide text pool referenced by `t="s"` cells.
///
/// Template entries are kept verbatim (rich-text runs included) because cells
/// elsewhere in the workbook reference them by position. New entries are only
/// ever appended, and the reverse lookup keys on trimmed text so the engine
/// never adds a second copy of a value it can already reach.
#[derive(Debug, Clone)]
pub struct SharedStringTable {
    doc: XmlDocument,
    entries: Vec<String>,
    lookup: HashMap<String, usize>,
    appended: usize,
}

impl SharedStringTable {
    pub fn new() -> Self {
        let root = XmlElement::new("sst")
            .with_attr("xmlns", SST_NAMESPACE)
            .with_attr("count", "0")
            .with_attr("uniqueCount", "0");
        Self {
            doc: XmlDocument {
                declaration: None,
                prolog_gap: String::new(),
                root,
            },
            entries: Vec::new(),
            lookup: HashMap::new(),
            appended: 0,
        }
    }

    pub fn load(bytes: &[u8]) -> Result<Self, AppError> {
        let doc = XmlDocument::parse(bytes)?;
        if !doc.root.is("sst") {
            return Err(AppError::MalformedTemplate(format!(
                "shared strings root is <{}>, expected <sst>",
                doc.root.name
            )));
        }

        let mut entries = Vec::new();
        let mut lookup = HashMap::new();
        for si in doc.root.children_named("si") {
            let text = Self::item_text(si);
            // First occurrence wins when the template already holds duplicates.
            lookup.entry(text.trim().to_string()).or_insert(entries.len());
            entries.push(text);
        }
        debug!(entries = entries.len(), "loaded shared string table");

        Ok(Self {
            doc,
            entries,
            lookup,
            appended: 0,
        })
    }

    // Plain `<t>` plus rich-text `<r><t>` runs; phonetic `<rPh>` hints are not visible text.
    fn item_text(si: &XmlElement) -> String {
        let mut out = String::new();
        for el in si.elements() {
            if el.is("t") {
                out.push_str(&el.text());
            } else if el.is("r") {
                for t in el.children_named("t") {
                    out.push_str(&t.text());
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn index_of(&self, text: &str) -> Option<usize> {
        self.lookup.get(text.trim()).copied()
    }

    pub fn is_dirty(&self) -> bool {
        self.appended > 0
    }

    pub fn get_or_create_index(&mut self, text: &str) -> usize {
        let key = text.trim();
        if let Some(index) = self.lookup.get(key) {
            return *index;
        }

        let index = self.entries.len();
        let mut t = XmlElement::new("t");
        t.set_text(key);
        let mut si = XmlElement::new("si");
        si.push_element(t);
        self.doc.root.children.push(XmlNode::Element(si));

        self.entries.push(key.to_string());
        self.lookup.insert(key.to_string(), index);
        self.appended += 1;
        index
    }

    pub fn serialize(&mut self) -> Result<Vec<u8>, AppError> {
        let total = self.entries.len().to_string();
        self.doc.root.set_attr("count", &total);
        self.doc.root.set_attr("uniqueCount", &total);
        self.doc.to_bytes()
    }
}

impl Default for SharedStringTable {
    fn default() -> Self {
        Self::new()
    }
}
