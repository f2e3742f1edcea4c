// XML document model for tree persistence
//
// The persisted format is attribute-based: one element per container
// (tag "Cnt", attributes id/name) nested arbitrarily, one element per
// parameter (tag "Pm", attributes id/name/val and optional valStr/unit).
// Matching on load is by (tag, id) scoped to the immediate parent element.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::{TreeError, TreeResult};

pub const CONTAINER_TAG: &str = "Cnt";
pub const PARAM_TAG: &str = "Pm";

pub const ATTR_ID: &str = "id";
pub const ATTR_NAME: &str = "name";
pub const ATTR_VALUE: &str = "val";
pub const ATTR_VALUE_STR: &str = "valStr";
pub const ATTR_UNIT: &str = "unit";

/// One XML element: tag, ordered attributes, nested child elements.
/// Text content is not part of the format and is dropped on read.
#[derive(Debug, Clone, Default)]
pub struct XmlElement {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(tag: &str) -> Self {
        XmlElement {
            tag: tag.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets or replaces an attribute, keeping first-write order
    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    /// Finds the direct child with the given tag whose `id` attribute
    /// matches. Unmatched lookups are not an error (partial documents
    /// are tolerated by the loaders).
    pub fn child_by_tag_and_id(&self, tag: &str, id: &str) -> Option<&XmlElement> {
        self.children
            .iter()
            .find(|child| child.tag == tag && child.attr(ATTR_ID) == Some(id))
    }
}

/// Parses a full document into its root element
pub fn parse_document(text: &str) -> TreeResult<XmlElement> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(start) => {
                stack.push(element_from(&start)?);
            }
            Event::Empty(start) => {
                let elem = element_from(&start)?;
                attach(&mut stack, &mut root, elem)?;
            }
            Event::End(_) => {
                let elem = stack.pop().ok_or_else(|| {
                    TreeError::Xml("closing tag without matching opening tag".into())
                })?;
                attach(&mut stack, &mut root, elem)?;
            }
            Event::Eof => break,
            // declarations, text, comments and processing instructions
            // carry no model data
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(TreeError::Xml("document ends inside an open element".into()));
    }
    root.ok_or_else(|| TreeError::Xml("document contains no root element".into()))
}

/// Renders the element as a standalone indented document
pub fn write_document(root: &XmlElement) -> TreeResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml_err)?;
    write_element(&mut writer, root)?;
    String::from_utf8(writer.into_inner())
        .map_err(|e| TreeError::Xml(format!("document is not valid utf-8: {e}")))
}

fn write_element(writer: &mut Writer<Vec<u8>>, elem: &XmlElement) -> TreeResult<()> {
    let mut start = BytesStart::new(elem.tag.as_str());
    for (name, value) in &elem.attributes {
        start.push_attribute((name.as_str(), value.as_str()));
    }
    if elem.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(xml_err)?;
    } else {
        writer.write_event(Event::Start(start)).map_err(xml_err)?;
        for child in &elem.children {
            write_element(writer, child)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(elem.tag.as_str())))
            .map_err(xml_err)?;
    }
    Ok(())
}

fn element_from(start: &BytesStart<'_>) -> TreeResult<XmlElement> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut elem = XmlElement::new(&tag);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| TreeError::Xml(e.to_string()))?;
        let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_err)?.into_owned();
        elem.set_attr(&name, &value);
    }
    Ok(elem)
}

fn attach(
    stack: &mut Vec<XmlElement>,
    root: &mut Option<XmlElement>,
    elem: XmlElement,
) -> TreeResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(elem),
        None if root.is_none() => *root = Some(elem),
        None => return Err(TreeError::Xml("document has more than one root".into())),
    }
    Ok(())
}

fn xml_err(err: impl std::fmt::Display) -> TreeError {
    TreeError::Xml(err.to_string())
}
