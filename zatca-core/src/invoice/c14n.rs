//! Canonical XML rendering, delegated to libxml2.
use libxml::{
    parser::Parser,
    tree::c14n::{CanonicalizationMode, CanonicalizationOptions},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanonicalizationError {
    #[error("XML parse error before canonicalization: {0}")]
    Parse(String),
    #[error("Failed to canonicalize xml")]
    Canonicalize,
}

/// Turns serialized markup into its canonical form.
///
/// Implementations must be pure functions of their input: equal markup in,
/// equal canonical text out.
pub trait Canonicalizer {
    fn canonicalize(&self, xml: &str) -> Result<String, CanonicalizationError>;
}

/// Canonicalization flavour used by [`LibxmlCanonicalizer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum C14nMode {
    /// Canonical XML 1.0, inclusive.
    #[default]
    Inclusive,
    /// Exclusive XML canonicalization 1.0.
    Exclusive,
    /// Canonical XML 1.1.
    Inclusive11,
}

impl C14nMode {
    fn as_libxml(self) -> CanonicalizationMode {
        match self {
            C14nMode::Inclusive => CanonicalizationMode::Canonical1_0,
            C14nMode::Exclusive => CanonicalizationMode::ExclusiveCanonical1_0,
            C14nMode::Inclusive11 => CanonicalizationMode::Canonical1_1,
        }
    }
}

/// Whole-document canonicalization without comments. The XML declaration is
/// dropped and whitespace text between elements is kept as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibxmlCanonicalizer {
    mode: C14nMode,
}

impl LibxmlCanonicalizer {
    pub fn new(mode: C14nMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> C14nMode {
        self.mode
    }
}

impl Canonicalizer for LibxmlCanonicalizer {
    fn canonicalize(&self, xml: &str) -> Result<String, CanonicalizationError> {
        let doc = Parser::default()
            .parse_string(xml)
            .map_err(|e| CanonicalizationError::Parse(format!("{e:?}")))?;
        let options = CanonicalizationOptions {
            mode: self.mode.as_libxml(),
            inclusive_ns_prefixes: vec![],
            with_comments: false,
        };
        doc.canonicalize(options, None)
            .map_err(|_| CanonicalizationError::Canonicalize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_declaration_and_expands_empty_elements() {
        let canonical = LibxmlCanonicalizer::default()
            .canonicalize(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a xmlns=\"urn:test\">\n    <b/>\n</a>",
            )
            .expect("canonicalize");
        assert_eq!(canonical, "<a xmlns=\"urn:test\">\n    <b></b>\n</a>");
    }

    #[test]
    fn orders_attributes_and_drops_comments() {
        let canonical = LibxmlCanonicalizer::new(C14nMode::Inclusive11)
            .canonicalize("<a z=\"1\" b=\"2\"><!-- note --><c>x</c></a>")
            .expect("canonicalize");
        assert_eq!(canonical, "<a b=\"2\" z=\"1\"><c>x</c></a>");
    }

    #[test]
    fn exclusive_mode_only_renders_used_namespaces() {
        let canonical = LibxmlCanonicalizer::new(C14nMode::Exclusive)
            .canonicalize("<p:a xmlns:p=\"urn:p\" xmlns:q=\"urn:q\"><p:b>1</p:b></p:a>")
            .expect("canonicalize");
        assert_eq!(canonical, "<p:a xmlns:p=\"urn:p\"><p:b>1</p:b></p:a>");
    }
}
