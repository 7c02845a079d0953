//! Ordered markup tree built from bill XML.
//!
//! Elements become [`Node::Object`] entries keyed by tag name, attributes are stored under the
//! `@_` prefix, and character data lives under `#text`. Entry order follows the document, and
//! consecutive siblings sharing a tag are grouped into a [`Node::Array`]. Non-consecutive
//! siblings keep separate entries so that interleaved text never changes order.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::MarkupError;

/// Key prefix for attributes.
pub const ATTRIBUTE_PREFIX: &str = "@_";
/// Key used for character data.
pub const TEXT_KEY: &str = "#text";
/// Deepest element nesting accepted by [`parse_xml`].
pub const MAX_NESTING_DEPTH: usize = 512;

/// One node of the parsed markup tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Leaf value: element text or attribute value.
    Scalar(String),
    /// Consecutive sibling elements sharing one tag.
    Array(Vec<Node>),
    /// Element with ordered children; keys may repeat when siblings interleave.
    Object(Vec<(String, Node)>),
}

impl Node {
    /// Leaf constructor.
    pub fn scalar(value: impl Into<String>) -> Self {
        Node::Scalar(value.into())
    }

    /// Object constructor from ordered `(key, node)` pairs.
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Node)>) -> Self {
        Node::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// First direct child stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Attribute value on this element, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self.get(&format!("{ATTRIBUTE_PREFIX}{name}")) {
            Some(Node::Scalar(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Depth-first search for the first element named `key`. Arrays resolve to their first item.
    pub fn find_first(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Scalar(_) => None,
            Node::Array(items) => items.iter().find_map(|item| item.find_first(key)),
            Node::Object(entries) => entries.iter().find_map(|(k, v)| {
                if k == key {
                    match v {
                        Node::Array(items) => items.first(),
                        other => Some(other),
                    }
                } else if k.starts_with(ATTRIBUTE_PREFIX) {
                    None
                } else {
                    v.find_first(key)
                }
            }),
        }
    }

    /// Every element named `key`, in document order, with arrays flattened.
    pub fn find_all(&self, key: &str) -> Vec<&Node> {
        let mut found = Vec::new();
        self.collect_named(key, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, key: &str, found: &mut Vec<&'a Node>) {
        match self {
            Node::Scalar(_) => {}
            Node::Array(items) => items.iter().for_each(|item| item.collect_named(key, found)),
            Node::Object(entries) => {
                for (k, v) in entries {
                    if k.starts_with(ATTRIBUTE_PREFIX) {
                        continue;
                    }
                    if k == key {
                        match v {
                            Node::Array(items) => found.extend(items.iter()),
                            other => found.push(other),
                        }
                    } else {
                        v.collect_named(key, found);
                    }
                }
            }
        }
    }

    /// All character data beneath this node, attributes excluded, whitespace collapsed.
    pub fn text_content(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        parts
            .iter()
            .flat_map(|part| part.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn collect_text<'a>(&'a self, parts: &mut Vec<&'a str>) {
        match self {
            Node::Scalar(value) => parts.push(value),
            Node::Array(items) => items.iter().for_each(|item| item.collect_text(parts)),
            Node::Object(entries) => entries
                .iter()
                .filter(|(k, _)| !k.starts_with(ATTRIBUTE_PREFIX))
                .for_each(|(_, v)| v.collect_text(parts)),
        }
    }
}

struct Frame {
    name: String,
    entries: Vec<(String, Node)>,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self, MarkupError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut entries = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|error| MarkupError::Xml(error.to_string()))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = match attribute.unescape_value() {
                Ok(value) => value.into_owned(),
                Err(_) => String::from_utf8_lossy(&attribute.value).into_owned(),
            };
            entries.push((format!("{ATTRIBUTE_PREFIX}{key}"), Node::Scalar(value)));
        }
        Ok(Self { name, entries })
    }

    fn push_text(&mut self, text: &str) {
        if !text.trim().is_empty() {
            self.entries
                .push((TEXT_KEY.to_string(), Node::Scalar(text.to_string())));
        }
    }

    fn push_child(&mut self, name: String, child: Node) {
        if let Some((last_key, last)) = self.entries.last_mut()
            && *last_key == name
        {
            match last {
                Node::Array(items) => items.push(child),
                other => {
                    let previous = std::mem::replace(other, Node::Array(Vec::new()));
                    *other = Node::Array(vec![previous, child]);
                }
            }
            return;
        }
        self.entries.push((name, child));
    }

    fn close(mut self) -> (String, Node) {
        let text_only =
            matches!(self.entries.as_slice(), [(key, Node::Scalar(_))] if key == TEXT_KEY);
        let node = if text_only || self.entries.is_empty() {
            match self.entries.pop() {
                Some((_, text)) => text,
                None => Node::Scalar(String::new()),
            }
        } else {
            Node::Object(self.entries)
        };
        (self.name, node)
    }
}

/// Parse XML bytes into an ordered tree whose top-level object holds the root element(s).
pub fn parse_xml(bytes: &[u8]) -> Result<Node, MarkupError> {
    let source = String::from_utf8_lossy(bytes);
    let mut reader = Reader::from_str(&source);
    reader.config_mut().trim_text(false);

    let mut stack = vec![Frame {
        name: String::new(),
        entries: Vec::new(),
    }];

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                // The root frame is not an element.
                if stack.len() > MAX_NESTING_DEPTH {
                    return Err(MarkupError::Xml(format!(
                        "elements nested deeper than {MAX_NESTING_DEPTH} levels"
                    )));
                }
                stack.push(Frame::open(&start)?);
            }
            Ok(Event::Empty(start)) => {
                let (name, node) = Frame::open(&start)?.close();
                if let Some(parent) = stack.last_mut() {
                    parent.push_child(name, node);
                }
            }
            Ok(Event::Text(text)) => {
                let value = match text.unescape() {
                    Ok(value) => value.into_owned(),
                    Err(_) => String::from_utf8_lossy(&text).into_owned(),
                };
                if let Some(frame) = stack.last_mut() {
                    frame.push_text(&value);
                }
            }
            Ok(Event::CData(data)) => {
                let value = String::from_utf8_lossy(&data).into_owned();
                if let Some(frame) = stack.last_mut() {
                    frame.push_text(&value);
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err(MarkupError::Xml("unbalanced closing tag".into()));
                }
                if let Some(frame) = stack.pop() {
                    let (name, node) = frame.close();
                    if let Some(parent) = stack.last_mut() {
                        parent.push_child(name, node);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(error) => return Err(MarkupError::Xml(error.to_string())),
        }
    }

    if stack.len() != 1 {
        return Err(MarkupError::Xml("document ended inside an element".into()));
    }
    let document = stack.pop().map(|frame| frame.entries).unwrap_or_default();
    Ok(Node::Object(document))
}
