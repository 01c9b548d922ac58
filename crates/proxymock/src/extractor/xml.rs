use sxd_document::dom::{Attribute, ChildOfElement, ChildOfRoot, Element, Text};
use sxd_document::parser;

use super::{walk, Node};

#[derive(Clone, Copy)]
pub(crate) enum XmlNode<'d> {
    Element(Element<'d>),
    Attribute(Attribute<'d>),
    Text(Text<'d>),
}

impl Node for XmlNode<'_> {
    fn children(&self) -> Vec<Self> {
        match *self {
            XmlNode::Element(element) => {
                let mut children: Vec<_> = element
                    .attributes()
                    .into_iter()
                    .map(XmlNode::Attribute)
                    .collect();
                children.extend(element.children().into_iter().filter_map(|child| {
                    match child {
                        ChildOfElement::Element(e) => Some(XmlNode::Element(e)),
                        ChildOfElement::Text(t) => Some(XmlNode::Text(t)),
                        _ => None,
                    }
                }));
                children
            }
            XmlNode::Attribute(_) | XmlNode::Text(_) => Vec::new(),
        }
    }
}

/// Concatenated text of every descendant text node.
fn text_content(element: Element<'_>) -> String {
    walk(XmlNode::Element(element), |node| match node {
        XmlNode::Text(text) => Some(text.text()),
        _ => None,
    })
    .concat()
}

/// Values in precedence order: matching attributes, matching elements, then
/// elements whose `name` attribute equals the key. `None` when the body is not XML.
pub(super) fn find_all(body: &str, key: &str) -> Option<Vec<String>> {
    let package = parser::parse(body).ok()?;
    let document = package.as_document();
    let root = document.root().children().into_iter().find_map(|child| match child {
        ChildOfRoot::Element(e) => Some(e),
        _ => None,
    })?;
    let root = XmlNode::Element(root);

    let mut found = walk(root, |node| match node {
        XmlNode::Attribute(attr) if attr.name().local_part().eq_ignore_ascii_case(key) => {
            Some(attr.value().to_string())
        }
        _ => None,
    });

    found.extend(walk(root, |node| match node {
        XmlNode::Element(e) if e.name().local_part().eq_ignore_ascii_case(key) => {
            Some(text_content(*e))
        }
        _ => None,
    }));

    found.extend(walk(root, |node| match node {
        XmlNode::Element(e) if has_name_attribute(*e, key) => Some(text_content(*e)),
        _ => None,
    }));

    Some(found)
}

fn has_name_attribute(element: Element<'_>, key: &str) -> bool {
    element.attributes().iter().any(|attr| {
        attr.name().local_part().eq_ignore_ascii_case("name")
            && attr.value().eq_ignore_ascii_case(key)
    })
}
