/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod iterators;
mod serializer;

use std::fmt::Display;
use std::str::FromStr;

use crate::stream::DocumentParser;
use crate::stream::ParserError;
pub use iterators::Attributes;
pub use iterators::ChildElements;
pub use serializer::Prefixes;

/// The namespace bound to the reserved `xml` prefix.
pub const NS_XML: &str = "http://www.w3.org/XML/1998/namespace";

/// A namespace qualified name.
///
/// Attributes without a prefix in the markup have no namespace.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct QName {
    pub uri: Option<String>,
    pub name: String,
}

impl QName {
    pub fn new(uri: Option<&str>, name: &str) -> QName {
        QName {
            uri: uri.map(str::to_string),
            name: name.to_string(),
        }
    }

    pub fn local(name: &str) -> QName {
        QName {
            uri: None,
            name: name.to_string(),
        }
    }

    fn is(&self, uri: Option<&str>, name: &str) -> bool {
        self.name == name && self.uri.as_deref() == uri
    }
}

/// A child of an element.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    /// Already serialized markup which is written out as is.
    Raw(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// A namespace aware XML element.
///
/// Elements own their children. There is no link back to the parent element,
/// operations which need context from the ancestors (like serialization and
/// positional queries) carry it down while walking the tree.
///
/// # Examples
///
/// ```
/// use iks_xmlstream::Element;
///
/// let mut iq = Element::new("iq", Some("jabber:client"));
/// iq.set_attribute("type", "get");
/// iq.add_child_element("query", Some("jabber:iq:version"), None);
/// assert_eq!(
///     iq.to_string(),
///     "<iq xmlns='jabber:client' type='get'><query xmlns='jabber:iq:version'/></iq>"
/// );
/// ```
#[derive(Clone, Debug)]
pub struct Element {
    pub name: String,
    pub uri: Option<String>,
    /// Namespace which unqualified child elements inherit.
    pub default_uri: Option<String>,
    attributes: Vec<(QName, String)>,
    children: Vec<Node>,
    local_prefixes: Vec<(String, String)>,
}

fn normalize(uri: Option<&str>) -> Option<String> {
    match uri {
        Some("") | None => None,
        Some(uri) => Some(uri.to_string()),
    }
}

impl Element {
    /// Creates a detached element whose children default to its own namespace.
    pub fn new(name: &str, uri: Option<&str>) -> Element {
        let uri = normalize(uri);
        Element {
            name: name.to_string(),
            default_uri: uri.clone(),
            uri,
            attributes: Vec::new(),
            children: Vec::new(),
            local_prefixes: Vec::new(),
        }
    }

    /// Creates a detached element with a different default namespace for its children.
    pub fn with_default_uri(name: &str, uri: Option<&str>, default_uri: Option<&str>) -> Element {
        Element {
            name: name.to_string(),
            uri: normalize(uri),
            default_uri: normalize(default_uri),
            attributes: Vec::new(),
            children: Vec::new(),
            local_prefixes: Vec::new(),
        }
    }

    pub fn is(&self, name: &str, uri: Option<&str>) -> bool {
        self.name == name && self.uri.as_deref() == uri
    }

    pub fn set_default_uri(&mut self, default_uri: Option<&str>) {
        self.default_uri = normalize(default_uri);
    }

    //
    // Children
    //

    /// Appends a new child element and returns it for further building.
    ///
    /// Without an explicit namespace the child inherits the default
    /// namespace of this element.
    pub fn add_child_element(
        &mut self,
        name: &str,
        uri: Option<&str>,
        content: Option<&str>,
    ) -> &mut Element {
        let uri = match uri {
            Some(uri) => Some(uri),
            None => self.default_uri.as_deref(),
        };
        let mut child = Element::new(name, uri);
        if let Some(content) = content {
            child.add_text(content);
        }
        self.add_child(child)
    }

    /// Appends an existing element as the last child.
    pub fn add_child(&mut self, child: Element) -> &mut Element {
        self.children.push(Node::Element(child));
        match self.children.last_mut() {
            Some(Node::Element(el)) => el,
            _ => unreachable!(),
        }
    }

    /// Appends character data, merging it with a trailing text node.
    pub fn add_text(&mut self, text: &str) {
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }

    /// Appends pre-serialized markup which is written out without escaping.
    ///
    /// The caller is responsible for the markup being well-formed.
    pub fn add_raw_markup(&mut self, markup: &str) {
        self.children.push(Node::Raw(markup.to_string()));
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    pub fn child_elements(&self) -> ChildElements<'_> {
        ChildElements::new(&self.children, None)
    }

    pub fn child_elements_named<'a>(&'a self, name: &'a str) -> ChildElements<'a> {
        ChildElements::new(&self.children, Some(name))
    }

    pub fn first_child_element(&self) -> Option<&Element> {
        self.child_elements().next()
    }

    pub fn first_child_named(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|node| match node {
            Node::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    pub fn first_child_named_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|node| match node {
            Node::Element(el) if el.name == name => Some(el),
            _ => None,
        })
    }

    /// Concatenation of the direct text children.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            if let Node::Text(s) = node {
                text.push_str(s);
            }
        }
        text
    }

    //
    // Attributes
    //

    pub fn attributes(&self) -> Attributes<'_> {
        Attributes::new(&self.attributes)
    }

    /// Returns the value of an attribute without a namespace.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attribute_ns(None, name)
    }

    pub fn attribute_ns(&self, uri: Option<&str>, name: &str) -> Option<&str> {
        let uri = uri.filter(|uri| !uri.is_empty());
        self.attributes
            .iter()
            .find(|(qname, _)| qname.is(uri, name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Sets an attribute without a namespace, replacing any previous value.
    pub fn set_attribute(&mut self, name: &str, value: &str) -> &mut Element {
        self.set_attribute_ns(None, name, value)
    }

    pub fn set_attribute_ns(&mut self, uri: Option<&str>, name: &str, value: &str) -> &mut Element {
        let uri = normalize(uri);
        match self
            .attributes
            .iter_mut()
            .find(|(qname, _)| qname.is(uri.as_deref(), name))
        {
            Some((_, old)) => {
                old.clear();
                old.push_str(value);
            }
            None => self.attributes.push((
                QName {
                    uri,
                    name: name.to_string(),
                },
                value.to_string(),
            )),
        }
        self
    }

    /// Removes an attribute, returning its value.
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.remove_attribute_ns(None, name)
    }

    pub fn remove_attribute_ns(&mut self, uri: Option<&str>, name: &str) -> Option<String> {
        let uri = uri.filter(|uri| !uri.is_empty());
        let index = self
            .attributes
            .iter()
            .position(|(qname, _)| qname.is(uri, name))?;
        Some(self.attributes.remove(index).1)
    }

    //
    // Namespace prefixes
    //

    /// Declares a prefix on this element, preferred by the serializer.
    pub fn add_local_prefix(&mut self, prefix: &str, uri: &str) {
        if let Some(entry) = self.local_prefixes.iter_mut().find(|(p, _)| p == prefix) {
            entry.1 = uri.to_string();
        } else {
            self.local_prefixes
                .push((prefix.to_string(), uri.to_string()));
        }
    }

    pub fn local_prefixes(&self) -> &[(String, String)] {
        &self.local_prefixes
    }

    //
    // Serialization
    //

    /// Serializes the element and its subtree.
    ///
    /// The element is treated as the top of the output, so its namespace is
    /// always declared.
    pub fn serialize(&self) -> String {
        let mut prefixes = Prefixes::new();
        self.serialize_with(&mut prefixes, None, &[], true)
    }

    /// Serializes the element in the context of an enclosing document.
    ///
    /// `default_uri` is the default namespace in effect at the parent and
    /// `in_scope` lists the prefixes the receiver already knows about (for
    /// example the `stream` prefix declared on a stream root). New prefixes
    /// are allocated from, and recorded in, `prefixes`. When `close_tag` is
    /// false only the start tag is written.
    pub fn serialize_with(
        &self,
        prefixes: &mut Prefixes,
        default_uri: Option<&str>,
        in_scope: &[&str],
        close_tag: bool,
    ) -> String {
        let mut buf = String::new();
        let mut scope = vec!["xml".to_string()];
        scope.extend(in_scope.iter().map(|p| p.to_string()));
        serializer::write_element(self, &mut buf, prefixes, default_uri, &mut scope, close_tag);
        buf
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.uri == other.uri
            && self.attributes.len() == other.attributes.len()
            && self
                .attributes
                .iter()
                .all(|(qname, value)| other.attribute_ns(qname.uri.as_deref(), &qname.name) == Some(value))
            && self.children == other.children
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl FromStr for Element {
    type Err = ParserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = DocumentParser::new();
        parser.parse_bytes(s.as_bytes())?;
        parser.into_element()
    }
}

#[cfg(test)]
mod tests;
