//! Markup to tree conversion on top of `quick-xml`.
use super::node::{XmlElement, XmlNode};
use super::{XmlDeclaration, XmlDocument};
use quick_xml::{
    Reader,
    events::{BytesStart, Event, attributes::AttrError},
};
use thiserror::Error;

/// Errors raised by the strict parser.
#[derive(Debug, Error)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Syntax(#[from] quick_xml::Error),
    #[error("malformed attribute: {0}")]
    Attribute(#[from] AttrError),
    #[error("tag name is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("closing tag </{0}> without a matching opening tag")]
    UnexpectedClose(String),
    #[error("element <{0}> is never closed")]
    Unclosed(String),
}

#[derive(Default)]
struct Frame {
    tag: String,
    element: XmlElement,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self, XmlError> {
        let mut element = XmlElement::new();
        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = std::str::from_utf8(attribute.key.as_ref())?;
            element.set_attribute(key, attribute.unescape_value()?);
        }
        Ok(Self {
            tag: std::str::from_utf8(start.name().as_ref())?.to_string(),
            element,
            text: String::new(),
        })
    }

    fn push_text(&mut self, text: &str) {
        self.text.push_str(text.trim());
    }

    fn close(self) -> (String, XmlNode) {
        let text = (!self.text.is_empty()).then_some(self.text);
        (self.tag, self.element.into_node(text))
    }
}

/// Parses `source` into a document, failing on the first syntax error.
pub(crate) fn parse_document(source: &str) -> Result<XmlDocument, XmlError> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(true);

    let mut declaration = None;
    let mut stack: Vec<Frame> = vec![Frame::default()];

    loop {
        match reader.read_event()? {
            Event::Decl(decl) => {
                let version = String::from_utf8_lossy(&decl.version()?).into_owned();
                let encoding = decl
                    .encoding()
                    .transpose()?
                    .map(|value| String::from_utf8_lossy(&value).into_owned());
                let standalone = decl
                    .standalone()
                    .transpose()?
                    .map(|value| String::from_utf8_lossy(&value).into_owned());
                declaration = Some(XmlDeclaration {
                    version,
                    encoding,
                    standalone,
                });
            }
            Event::Start(start) => stack.push(Frame::open(&start)?),
            Event::Empty(start) => {
                let (tag, node) = Frame::open(&start)?.close();
                if let Some(parent) = stack.last_mut() {
                    parent.element.append(tag, node);
                }
            }
            Event::End(end) => {
                let name = std::str::from_utf8(end.name().as_ref())?.to_string();
                if stack.len() < 2 {
                    return Err(XmlError::UnexpectedClose(name));
                }
                if let Some(frame) = stack.pop() {
                    let (tag, node) = frame.close();
                    if let Some(parent) = stack.last_mut() {
                        parent.element.append(tag, node);
                    }
                }
            }
            Event::Text(text) => {
                if let Some(frame) = stack.last_mut() {
                    frame.push_text(&text.unescape()?);
                }
            }
            Event::CData(data) => {
                if let Some(frame) = stack.last_mut() {
                    frame.push_text(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() > 1 {
        let tag = stack.pop().map(|frame| frame.tag).unwrap_or_default();
        return Err(XmlError::Unclosed(tag));
    }
    let root = stack.pop().map(|frame| frame.element).unwrap_or_default();

    Ok(XmlDocument::from_parts(declaration, root))
}
