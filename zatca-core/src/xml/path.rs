//! Path queries and the descent cursor.
use super::node::{XmlElement, XmlNode, XmlValue};
use std::fmt;

/// `/`-delimited list of tag names, split once up front.
///
/// Prefixed tags such as `cac:Delivery` are opaque tokens; no namespace
/// resolution happens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathQuery {
    segments: Vec<String>,
}

impl PathQuery {
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The empty path addresses the whole document.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Splits into the container path and the terminal tag.
    pub fn split_last(&self) -> Option<(&str, &[String])> {
        self.segments
            .split_last()
            .map(|(last, init)| (last.as_str(), init))
    }
}

impl fmt::Display for PathQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Position reached after consuming a path.
///
/// `current` is the value under `last` in `parent`; it is `None` when the
/// final tag is absent or an intermediate step could not be taken.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor<'a, 'p> {
    pub(crate) current: Option<&'a XmlValue>,
    pub(crate) parent: Option<&'a XmlElement>,
    pub(crate) last: Option<&'p str>,
}

impl<'a, 'p> Cursor<'a, 'p> {
    const MISSING: Cursor<'static, 'static> = Cursor {
        current: None,
        parent: None,
        last: None,
    };

    /// Walks `segments` from `root`. Only single elements can be descended
    /// through; a sequence in the middle of a path is a miss.
    pub(crate) fn descend(root: &'a XmlNode, segments: &'p [String]) -> Self {
        let mut cursor = Cursor::MISSING;
        let mut container = root.as_element();
        for segment in segments {
            let Some(element) = container else {
                return Cursor::MISSING;
            };
            let value = element.child(segment);
            cursor = Cursor {
                current: value,
                parent: Some(element),
                last: Some(segment.as_str()),
            };
            container = match value {
                Some(XmlValue::Single(node)) => node.as_element(),
                _ => None,
            };
        }
        cursor
    }
}

/// Mutable walk to the element addressed by `segments`, used by the mutating
/// operations. Every step must be a single element.
pub(crate) fn element_mut<'a>(
    root: &'a mut XmlNode,
    segments: &[String],
) -> Option<&'a mut XmlElement> {
    let mut current = root;
    for segment in segments {
        current = match current.as_element_mut()?.child_mut(segment)? {
            XmlValue::Single(node) => node,
            XmlValue::Many(_) => return None,
        };
    }
    current.as_element_mut()
}
