//! Node types of the tree document.

/// A node in the tree: either a bare scalar or an element.
///
/// Elements without attributes and without children collapse to [`XmlNode::Text`]
/// when parsed, so `<cbc:ID>QR</cbc:ID>` reads back as the scalar `"QR"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Text(String),
    Element(XmlElement),
}

/// Attribute-bearing node with an optional text payload and ordered children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<(String, XmlValue)>,
}

/// Value stored under a child tag.
///
/// A tag seen once is `Single`; a second occurrence promotes it to `Many`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlValue {
    Single(XmlNode),
    Many(Vec<XmlNode>),
}

impl XmlNode {
    pub fn text(value: impl Into<String>) -> Self {
        XmlNode::Text(value.into())
    }

    /// Text content of a scalar, or the text payload of an element.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            XmlNode::Text(text) => Some(text),
            XmlNode::Element(element) => element.text(),
        }
    }

    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut XmlElement> {
        match self {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.as_element().and_then(|element| element.attribute(name))
    }

    pub fn child(&self, tag: &str) -> Option<&XmlValue> {
        self.as_element().and_then(|element| element.child(tag))
    }

    /// Returns the element behind this node, turning an empty scalar into an
    /// empty element first. A scalar carrying text is not a container.
    pub(crate) fn container_mut(&mut self) -> Option<&mut XmlElement> {
        if matches!(self, XmlNode::Text(text) if text.is_empty()) {
            *self = XmlNode::Element(XmlElement::default());
        }
        self.as_element_mut()
    }
}

impl XmlElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Appends a child, promoting an existing tag to a sequence.
    pub fn with_child(mut self, tag: impl Into<String>, node: impl Into<XmlNode>) -> Self {
        self.append(tag, node.into());
        self
    }

    /// Stores `nodes` under `tag`; an empty list leaves the tag absent.
    pub fn with_children(mut self, tag: impl Into<String>, nodes: Vec<XmlNode>) -> Self {
        if let Some(value) = XmlValue::from_nodes(nodes) {
            self.insert(tag, value);
        }
        self
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &XmlValue)> {
        self.children.iter().map(|(tag, value)| (tag.as_str(), value))
    }

    pub fn child(&self, tag: &str) -> Option<&XmlValue> {
        self.children
            .iter()
            .find(|(key, _)| key == tag)
            .map(|(_, value)| value)
    }

    pub fn child_mut(&mut self, tag: &str) -> Option<&mut XmlValue> {
        self.children
            .iter_mut()
            .find(|(key, _)| key == tag)
            .map(|(_, value)| value)
    }

    /// Replaces the value under `tag` in place, or appends the tag at the end.
    pub fn insert(&mut self, tag: impl Into<String>, value: XmlValue) {
        let tag = tag.into();
        match self.child_mut(&tag) {
            Some(slot) => *slot = value,
            None => self.children.push((tag, value)),
        }
    }

    pub fn remove(&mut self, tag: &str) -> Option<XmlValue> {
        let index = self.children.iter().position(|(key, _)| key == tag)?;
        Some(self.children.remove(index).1)
    }

    /// Adds `node` under `tag`: absent becomes single, single becomes a
    /// two-element sequence (old first), a sequence grows at the end.
    pub fn append(&mut self, tag: impl Into<String>, node: XmlNode) {
        let tag = tag.into();
        match self.children.iter().position(|(key, _)| *key == tag) {
            Some(index) => {
                let (_, slot) = &mut self.children[index];
                let current = std::mem::replace(slot, XmlValue::Many(Vec::new()));
                *slot = current.push(node);
            }
            None => self.children.push((tag, XmlValue::Single(node))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.text.is_none() && self.children.is_empty()
    }

    /// Finishes a parsed element: without attributes and children it
    /// collapses to a scalar holding `text` (or `""`).
    pub(crate) fn into_node(mut self, text: Option<String>) -> XmlNode {
        if self.attributes.is_empty() && self.children.is_empty() {
            return XmlNode::Text(text.unwrap_or_default());
        }
        self.text = text;
        XmlNode::Element(self)
    }
}

impl XmlValue {
    /// Normalizes a node list: none is absent, one is `Single`, more is `Many`.
    pub fn from_nodes(mut nodes: Vec<XmlNode>) -> Option<Self> {
        match nodes.len() {
            0 => None,
            1 => nodes.pop().map(XmlValue::Single),
            _ => Some(XmlValue::Many(nodes)),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, XmlNode> {
        match self {
            XmlValue::Single(node) => std::slice::from_ref(node).iter(),
            XmlValue::Many(nodes) => nodes.iter(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            XmlValue::Single(_) => 1,
            XmlValue::Many(nodes) => nodes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first(&self) -> Option<&XmlNode> {
        self.iter().next()
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, XmlValue::Many(_))
    }

    fn push(self, node: XmlNode) -> Self {
        match self {
            XmlValue::Single(existing) => XmlValue::Many(vec![existing, node]),
            XmlValue::Many(mut nodes) => {
                nodes.push(node);
                XmlValue::Many(nodes)
            }
        }
    }
}

impl<'a> IntoIterator for &'a XmlValue {
    type Item = &'a XmlNode;
    type IntoIter = std::slice::Iter<'a, XmlNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl From<&str> for XmlNode {
    fn from(value: &str) -> Self {
        XmlNode::Text(value.to_string())
    }
}

impl From<String> for XmlNode {
    fn from(value: String) -> Self {
        XmlNode::Text(value)
    }
}

impl From<XmlElement> for XmlNode {
    fn from(element: XmlElement) -> Self {
        XmlNode::Element(element)
    }
}

impl From<XmlNode> for XmlValue {
    fn from(node: XmlNode) -> Self {
        XmlValue::Single(node)
    }
}

impl From<XmlElement> for XmlValue {
    fn from(element: XmlElement) -> Self {
        XmlValue::Single(XmlNode::Element(element))
    }
}

impl From<&str> for XmlValue {
    fn from(value: &str) -> Self {
        XmlValue::Single(XmlNode::from(value))
    }
}

impl From<String> for XmlValue {
    fn from(value: String) -> Self {
        XmlValue::Single(XmlNode::from(value))
    }
}

impl From<Vec<XmlNode>> for XmlValue {
    fn from(nodes: Vec<XmlNode>) -> Self {
        XmlValue::Many(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_promotes_scalar_to_sequence_keeping_order() {
        let mut element = XmlElement::new().with_child("cbc:Note", "first");
        element.append("cbc:Note", XmlNode::text("second"));

        let value = element.child("cbc:Note").expect("note present");
        assert!(value.is_sequence());
        let texts: Vec<_> = value.iter().filter_map(XmlNode::as_text).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn insert_keeps_tag_position() {
        let mut element = XmlElement::new()
            .with_child("a", "1")
            .with_child("b", "2")
            .with_child("c", "3");
        element.insert("b", XmlValue::from("changed"));

        let tags: Vec<_> = element.children().map(|(tag, _)| tag).collect();
        assert_eq!(tags, vec!["a", "b", "c"]);
        assert_eq!(
            element.child("b").and_then(XmlValue::first).and_then(XmlNode::as_text),
            Some("changed")
        );
    }

    #[test]
    fn from_nodes_normalizes_length() {
        assert_eq!(XmlValue::from_nodes(Vec::new()), None);
        assert_eq!(
            XmlValue::from_nodes(vec![XmlNode::text("x")]),
            Some(XmlValue::Single(XmlNode::text("x")))
        );
        assert!(
            XmlValue::from_nodes(vec![XmlNode::text("x"), XmlNode::text("y")])
                .is_some_and(|value| value.is_sequence())
        );
    }

    #[test]
    fn into_node_collapses_plain_leaves() {
        assert_eq!(
            XmlElement::new().into_node(Some("388".into())),
            XmlNode::text("388")
        );
        let with_attr = XmlElement::new()
            .with_attribute("name", "0211010")
            .into_node(Some("388".into()));
        assert_eq!(with_attr.attribute("name"), Some("0211010"));
        assert_eq!(with_attr.as_text(), Some("388"));
    }

    #[test]
    fn empty_scalar_is_promoted_to_container() {
        let mut node = XmlNode::text("");
        assert!(node.container_mut().is_some());
        assert!(matches!(node, XmlNode::Element(_)));

        let mut filled = XmlNode::text("value");
        assert!(filled.container_mut().is_none());
    }
}
