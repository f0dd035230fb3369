use crate::common::errors::AppError;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use std::borrow::Cow;
use std::io::Cursor;

/// Owned markup tree for one package part.
///
/// Names are kept exactly as written (`xdr:row`, `x14ac:dyDescent`) and
/// attributes keep their source order, so re-serializing a part only changes
/// what was edited.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub declaration: Option<XmlDeclaration>,
    // Whitespace between the declaration and the root element.
    pub prolog_gap: String,
    pub root: XmlElement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

impl Default for XmlDeclaration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            encoding: Some("UTF-8".to_string()),
            standalone: Some("yes".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self, AppError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| AppError::MalformedTemplate(format!("part is not UTF-8: {e}")))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(false);

        let mut declaration = None;
        let mut prolog_gap = String::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| AppError::MalformedTemplate(e.to_string()))?;
            match event {
                Event::Decl(d) => declaration = Some(Self::read_declaration(&d)?),
                Event::Start(e) => stack.push(XmlElement::from_start(&e)?),
                Event::Empty(e) => {
                    let element = XmlElement::from_start(&e)?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        AppError::MalformedTemplate("unbalanced closing tag".to_string())
                    })?;
                    Self::attach(&mut stack, &mut root, element)?;
                }
                Event::Text(t) => {
                    let value = t
                        .unescape()
                        .map_err(|e| AppError::MalformedTemplate(e.to_string()))?
                        .into_owned();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Text(value)),
                        None if root.is_none() => prolog_gap.push_str(&value),
                        None => {}
                    }
                }
                Event::CData(c) => {
                    if let Some(parent) = stack.last_mut() {
                        let value = String::from_utf8_lossy(&c).into_owned();
                        parent.children.push(XmlNode::CData(value));
                    }
                }
                Event::Comment(c) => {
                    if let Some(parent) = stack.last_mut() {
                        let value = String::from_utf8_lossy(&c).into_owned();
                        parent.children.push(XmlNode::Comment(value));
                    }
                }
                Event::PI(p) => {
                    if let Some(parent) = stack.last_mut() {
                        let value = String::from_utf8_lossy(&p).into_owned();
                        parent.children.push(XmlNode::ProcessingInstruction(value));
                    }
                }
                Event::DocType(_) => {}
                Event::Eof => break,
            }
        }

        if !stack.is_empty() {
            return Err(AppError::MalformedTemplate(
                "unexpected end of markup".to_string(),
            ));
        }
        let root = root.ok_or_else(|| AppError::MalformedTemplate("part has no root element".to_string()))?;
        Ok(Self {
            declaration,
            prolog_gap,
            root,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, AppError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        let decl = self.declaration.clone().unwrap_or_default();
        writer
            .write_event(Event::Decl(BytesDecl::new(
                &decl.version,
                decl.encoding.as_deref(),
                decl.standalone.as_deref(),
            )))
            .map_err(|e| AppError::XmlParseError(e.to_string()))?;
        if !self.prolog_gap.is_empty() {
            writer
                .write_event(Event::Text(BytesText::new(&self.prolog_gap)))
                .map_err(|e| AppError::XmlParseError(e.to_string()))?;
        } else if self.declaration.is_none() {
            writer
                .write_event(Event::Text(BytesText::new("\r\n")))
                .map_err(|e| AppError::XmlParseError(e.to_string()))?;
        }
        Self::write_element(&mut writer, &self.root)?;
        Ok(writer.into_inner().into_inner())
    }

    fn read_declaration(d: &BytesDecl<'_>) -> Result<XmlDeclaration, AppError> {
        let version = d
            .version()
            .map_err(|e| AppError::MalformedTemplate(e.to_string()))?;
        let encoding = match d.encoding() {
            Some(Ok(v)) => Some(String::from_utf8_lossy(&v).into_owned()),
            Some(Err(e)) => return Err(AppError::MalformedTemplate(e.to_string())),
            None => None,
        };
        let standalone = match d.standalone() {
            Some(Ok(v)) => Some(String::from_utf8_lossy(&v).into_owned()),
            Some(Err(e)) => return Err(AppError::MalformedTemplate(e.to_string())),
            None => None,
        };
        Ok(XmlDeclaration {
            version: String::from_utf8_lossy(&version).into_owned(),
            encoding,
            standalone,
        })
    }

    fn attach(
        stack: &mut [XmlElement],
        root: &mut Option<XmlElement>,
        element: XmlElement,
    ) -> Result<(), AppError> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(XmlNode::Element(element)),
            None if root.is_none() => *root = Some(element),
            None => {
                return Err(AppError::MalformedTemplate(
                    "more than one root element".to_string(),
                ))
            }
        }
        Ok(())
    }

    fn write_element(
        writer: &mut Writer<Cursor<Vec<u8>>>,
        element: &XmlElement,
    ) -> Result<(), AppError> {
        let mut start = BytesStart::new(element.name.as_str());
        for (key, value) in &element.attributes {
            start.push_attribute(Attribute {
                key: QName(key.as_bytes()),
                value: Cow::Owned(escape_attr_value(value).into_bytes()),
            });
        }
        if element.children.is_empty() {
            writer
                .write_event(Event::Empty(start))
                .map_err(|e| AppError::XmlParseError(e.to_string()))?;
            return Ok(());
        }

        writer
            .write_event(Event::Start(start))
            .map_err(|e| AppError::XmlParseError(e.to_string()))?;
        for child in &element.children {
            match child {
                XmlNode::Element(el) => Self::write_element(writer, el)?,
                XmlNode::Text(t) => writer
                    .write_event(Event::Text(BytesText::new(t)))
                    .map_err(|e| AppError::XmlParseError(e.to_string()))?,
                XmlNode::CData(t) => writer
                    .write_event(Event::CData(BytesCData::new(t.as_str())))
                    .map_err(|e| AppError::XmlParseError(e.to_string()))?,
                XmlNode::Comment(t) => writer
                    .write_event(Event::Comment(BytesText::from_escaped(t.as_str())))
                    .map_err(|e| AppError::XmlParseError(e.to_string()))?,
                XmlNode::ProcessingInstruction(t) => writer
                    .write_event(Event::PI(BytesPI::new(t.as_str())))
                    .map_err(|e| AppError::XmlParseError(e.to_string()))?,
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(element.name.as_str())))
            .map_err(|e| AppError::XmlParseError(e.to_string()))?;
        Ok(())
    }
}

/// Escapes an attribute value, including the whitespace characters that
/// attribute-value normalization would otherwise fold into spaces.
pub fn escape_attr_value(value: &str) -> String {
    let escaped = quick_xml::escape::escape(value);
    if !escaped.contains(['\n', '\r', '\t']) {
        return escaped.into_owned();
    }
    escaped
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
        .replace('\t', "&#9;")
}

impl XmlElement {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.set_attr(key, value);
        self
    }

    fn from_start(e: &BytesStart<'_>) -> Result<Self, AppError> {
        let name = std::str::from_utf8(e.name().as_ref())
            .map_err(|err| AppError::MalformedTemplate(err.to_string()))?
            .to_string();
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| AppError::MalformedTemplate(err.to_string()))?;
            let key = std::str::from_utf8(attr.key.as_ref())
                .map_err(|err| AppError::MalformedTemplate(err.to_string()))?
                .to_string();
            let value = attr
                .unescape_value()
                .map_err(|err| AppError::MalformedTemplate(err.to_string()))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
        })
    }

    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    pub fn is(&self, local: &str) -> bool {
        is_local_name(&self.name, local)
    }

    /// Attribute value by qualified name as written (`r`, `s`, `r:id`).
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    // Matches on the local part only, so `r:id` is found whatever prefix the
    // producer bound to the relationships namespace.
    pub fn attr_local(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.contains(':') && is_local_name(k, local))
            .or_else(|| self.attributes.iter().find(|(k, _)| k == local))
            .map(|(_, v)| v.as_str())
    }

    // Replaces in place so the attribute keeps its position.
    pub fn set_attr(&mut self, key: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.attributes.push((key.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(pos).1)
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|c| match c {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.is(local))
    }

    pub fn child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|el| el.is(local))
    }

    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.elements().filter(move |el| el.is(local))
    }

    pub fn children_named_mut<'a>(
        &'a mut self,
        local: &'a str,
    ) -> impl Iterator<Item = &'a mut XmlElement> + 'a {
        self.elements_mut().filter(move |el| el.is(local))
    }

    /// All descendant elements with the given local name, document order.
    pub fn descendants(&self, local: &str) -> Vec<&XmlElement> {
        let mut found = Vec::new();
        self.collect_descendants(local, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, local: &str, found: &mut Vec<&'a XmlElement>) {
        for el in self.elements() {
            if el.is(local) {
                found.push(el);
            }
            el.collect_descendants(local, found);
        }
    }

    pub fn for_each_descendant_mut<F>(&mut self, local: &str, f: &mut F)
    where
        F: FnMut(&mut XmlElement),
    {
        for el in self.elements_mut() {
            if el.is(local) {
                f(el);
            }
            el.for_each_descendant_mut(local, f);
        }
    }

    /// Concatenated text of this element and all descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
                XmlNode::Element(el) => el.collect_text(out),
                _ => {}
            }
        }
    }

    pub fn set_text(&mut self, text: &str) {
        self.children = vec![XmlNode::Text(text.to_string())];
    }

    pub fn push_element(&mut self, element: XmlElement) {
        self.children.push(XmlNode::Element(element));
    }
}

fn local_part(full_name: &str) -> &str {
    full_name.rsplit(':').next().unwrap_or(full_name)
}

pub fn is_local_name(full_name: &str, local_name: &str) -> bool {
    local_part(full_name) == local_name
}
