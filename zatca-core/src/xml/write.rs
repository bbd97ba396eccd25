//! Deterministic tree to markup serialization.
use super::node::{XmlElement, XmlNode, XmlValue};
use super::{SerializeOptions, XmlDocument};
use quick_xml::escape::{escape, partial_escape};

const INDENT: &str = "    ";

pub(crate) fn write_document(doc: &XmlDocument, options: SerializeOptions) -> String {
    let mut lines: Vec<String> = Vec::new();
    if !options.omit_declaration {
        if let Some(declaration) = doc.declaration() {
            lines.push(declaration.to_string());
        }
    }
    if let Some(root) = doc.root().as_element() {
        for (tag, value) in root.children() {
            write_value(&mut lines, tag, value, 0);
        }
    }
    lines.join("\n")
}

fn write_value(lines: &mut Vec<String>, tag: &str, value: &XmlValue, depth: usize) {
    for node in value {
        write_node(lines, tag, node, depth);
    }
}

fn write_node(lines: &mut Vec<String>, tag: &str, node: &XmlNode, depth: usize) {
    let indent = INDENT.repeat(depth);
    match node {
        XmlNode::Text(text) => {
            lines.push(format!("{indent}<{tag}>{}</{tag}>", partial_escape(text)));
        }
        XmlNode::Element(element) => write_element(lines, tag, element, depth, &indent),
    }
}

fn write_element(
    lines: &mut Vec<String>,
    tag: &str,
    element: &XmlElement,
    depth: usize,
    indent: &str,
) {
    let open = open_tag(tag, element);
    let text = element.text().map(partial_escape);

    if element.children().next().is_none() {
        lines.push(format!(
            "{indent}{open}{}</{tag}>",
            text.as_deref().unwrap_or_default()
        ));
        return;
    }

    lines.push(format!("{indent}{open}"));
    if let Some(text) = text {
        lines.push(format!("{indent}{INDENT}{text}"));
    }
    for (child_tag, value) in element.children() {
        write_value(lines, child_tag, value, depth + 1);
    }
    lines.push(format!("{indent}</{tag}>"));
}

fn open_tag(tag: &str, element: &XmlElement) -> String {
    let mut open = format!("<{tag}");
    for (name, value) in element.attributes() {
        open.push_str(&format!(" {name}=\"{}\"", escape(value.as_str())));
    }
    open.push('>');
    open
}
