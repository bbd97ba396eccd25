//! Structural match conditions used to filter query results.
use super::node::{XmlNode, XmlValue};

/// Predicate evaluated against a node.
///
/// `Text` compares the node's text directly. `Fields` holds `(key, expected)`
/// pairs that must all hold; a key is either an attribute (`@mimeCode`) or a
/// `/`-delimited sub-path below the node (`cac:Attachment/cbc:ID`).
///
/// # Examples
/// ```rust
/// use zatca_core::xml::{Condition, XmlDocument};
///
/// let doc = XmlDocument::new(Some(
///     "<Invoice><Ref><ID>ICV</ID></Ref><Ref><ID>QR</ID></Ref></Invoice>",
/// ));
/// let qr = doc.get("Invoice/Ref", Some(&Condition::field("ID", "QR")));
/// assert_eq!(qr.map(|nodes| nodes.len()), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Text(String),
    Fields(Vec<(String, String)>),
}

impl Condition {
    pub fn text(expected: impl Into<String>) -> Self {
        Condition::Text(expected.into())
    }

    pub fn field(key: impl Into<String>, expected: impl Into<String>) -> Self {
        Condition::Fields(vec![(key.into(), expected.into())])
    }

    /// Adds another required pair. A `Text` condition becomes a field list
    /// that still requires the original text under the empty key.
    pub fn and(self, key: impl Into<String>, expected: impl Into<String>) -> Self {
        let mut fields = match self {
            Condition::Fields(fields) => fields,
            Condition::Text(text) => vec![(String::new(), text)],
        };
        fields.push((key.into(), expected.into()));
        Condition::Fields(fields)
    }

    pub fn matches(&self, node: &XmlNode) -> bool {
        match self {
            Condition::Text(expected) => node.as_text() == Some(expected.as_str()),
            Condition::Fields(fields) => fields
                .iter()
                .all(|(key, expected)| field_matches(node, key, expected)),
        }
    }
}

fn field_matches(node: &XmlNode, key: &str, expected: &str) -> bool {
    if let Some(name) = key.strip_prefix('@') {
        return node.attribute(name) == Some(expected);
    }

    // Breadth-first over every node reachable through the sub-path; sequences
    // match when any member does.
    let mut frontier = vec![node];
    for segment in key.split('/').filter(|segment| !segment.is_empty()) {
        frontier = frontier
            .into_iter()
            .filter_map(|candidate| candidate.child(segment))
            .flat_map(XmlValue::iter)
            .collect();
        if frontier.is_empty() {
            return false;
        }
    }
    frontier
        .into_iter()
        .any(|candidate| candidate.as_text() == Some(expected))
}
